// monitor.rs - Call-time enforcement with a hash-chained audit trail.
//
// The Monitor parses a covenant once, then decides every action at call
// time: policy evaluation, then the rate-limit override for results that
// are still permitted. Each decision is appended to the audit chain before
// the caller sees it, so a denial returned as an error is always on record.
//
// Chain and rate-limit windows live behind one mutex. The decision (check
// and increment included) and its audit append happen under a single lock
// acquisition in `evaluate`. `execute` releases the lock while the handler
// runs and re-acquires it to append, so a slow handler never blocks other
// callers. Callbacks run after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use covenant_audit::{
    verify_merkle_proof, AuditChain, AuditEntry, AuditLog, EntryDraft, EntryResult, MerkleProof,
    Outcome,
};
use covenant_ccl::{evaluate, Context, EvaluationResult, PolicyDocument, Severity};

use crate::clock::{Clock, SystemClock};
use crate::config::{EnforcementMode, MonitorConfig};
use crate::error::{require_non_empty, EnforcementError};
use crate::rate_limit::{RateLimitState, RateLimitStatus, RateLimiter};

#[derive(Debug, Default)]
struct MonitorState {
    chain: AuditChain,
    limiter: RateLimiter,
}

/// Evaluates actions against a covenant and records every decision.
pub struct Monitor {
    covenant_id: String,
    document: PolicyDocument,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

impl Monitor {
    /// Parse `constraints` and build a monitor for `covenant_id`.
    pub fn new(
        covenant_id: impl Into<String>,
        constraints: &str,
        config: MonitorConfig,
    ) -> Result<Self, EnforcementError> {
        let covenant_id = covenant_id.into();
        require_non_empty("covenant_id", &covenant_id)?;
        require_non_empty("constraints", constraints)?;
        let document = covenant_ccl::parse(constraints)?;
        debug!(
            covenant_id = %covenant_id,
            statements = document.len(),
            mode = %config.settings.mode,
            "monitor ready"
        );
        Ok(Self {
            covenant_id,
            document,
            config,
            clock: Arc::new(SystemClock),
            state: Mutex::new(MonitorState::default()),
        })
    }

    /// Replace the time source used for timestamps and rate windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn covenant_id(&self) -> &str {
        &self.covenant_id
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    pub fn mode(&self) -> EnforcementMode {
        self.config.settings.mode
    }

    /// Decide `action` on `resource` and record the decision.
    ///
    /// In enforce mode a denial is returned as `EnforcementError::ActionDenied`
    /// after the entry is appended. In log-only mode the result is always
    /// returned and the caller inspects `permitted`.
    pub fn evaluate(
        &self,
        action: &str,
        resource: &str,
        context: &Context,
    ) -> Result<EvaluationResult, EnforcementError> {
        require_non_empty("action", action)?;

        let (result, entry) = {
            let mut state = self.lock();
            let result = self.decide(&mut state, action, resource, context);
            let draft = self.draft(action, resource, context, &result, self.outcome_for(&result));
            let entry = state.chain.append(draft)?.clone();
            (result, entry)
        };

        self.notify(&result, &entry);
        self.enforce(result, action, resource)
    }

    /// Decide `action` on `resource` and, unless denied in enforce mode,
    /// run `handler`.
    ///
    /// The handler's own error is returned unchanged. Its message is
    /// recorded on the entry, whose outcome stays `EXECUTED`.
    ///
    /// The lock is released while the handler runs and taken again to
    /// append its entry. With parallel callers the entry index therefore
    /// follows handler completion, not the order in which calls were
    /// decided or counted against a rate limit. The chain stays valid.
    pub fn execute<T, E, F>(
        &self,
        action: &str,
        resource: &str,
        context: &Context,
        handler: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<EnforcementError> + std::fmt::Display,
    {
        require_non_empty("action", action)?;

        let result = {
            let mut state = self.lock();
            let result = self.decide(&mut state, action, resource, context);
            if !result.permitted && self.mode() == EnforcementMode::Enforce {
                let draft = self.draft(action, resource, context, &result, Outcome::Denied);
                let entry = state
                    .chain
                    .append(draft)
                    .map_err(EnforcementError::from)?
                    .clone();
                drop(state);
                self.notify(&result, &entry);
                return Err(self.denial(result, action, resource).into());
            }
            result
        };

        // The handler runs without the lock held.
        let output = handler();

        let mut draft = self.draft(action, resource, context, &result, Outcome::Executed);
        if let Err(err) = &output {
            warn!(action, resource, error = %err, "handler failed");
            draft = draft.with_error(err.to_string());
        }
        let entry = self
            .lock()
            .chain
            .append(draft)
            .map_err(EnforcementError::from)?
            .clone();
        self.notify(&result, &entry);
        output
    }

    /// Snapshot of the audit log with its current Merkle root.
    pub fn get_audit_log(&self) -> AuditLog {
        AuditLog::snapshot(self.covenant_id.clone(), &self.lock().chain)
    }

    pub fn get_audit_entry(&self, index: usize) -> Option<AuditEntry> {
        self.lock().chain.get(index).cloned()
    }

    /// Re-walk the chain. An empty log is valid.
    pub fn verify_audit_log_integrity(&self) -> bool {
        self.lock().chain.verify().is_ok()
    }

    pub fn compute_merkle_root(&self) -> String {
        self.lock().chain.merkle_root()
    }

    /// Inclusion proof for the entry at `index`. Fails without side effects
    /// when `index` is past the end of the log.
    pub fn generate_merkle_proof(&self, index: usize) -> Result<MerkleProof, EnforcementError> {
        self.lock()
            .chain
            .merkle_proof(index)
            .map_err(|e| EnforcementError::invalid("index", e.to_string()))
    }

    pub fn verify_merkle_proof(proof: &MerkleProof) -> bool {
        verify_merkle_proof(proof)
    }

    /// Where `action` stands against its governing limit. Does not count
    /// as a call.
    pub fn check_rate_limit(&self, action: &str) -> RateLimitStatus {
        self.lock()
            .limiter
            .peek(self.document.limits(), action, self.clock.now_ms())
    }

    pub fn get_rate_limit_state(&self) -> Vec<RateLimitState> {
        self.lock().limiter.states()
    }

    /// Clear the audit log and every rate-limit window.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.chain.clear();
        state.limiter.clear();
        debug!(covenant_id = %self.covenant_id, "monitor reset");
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Policy decision plus rate limiting. Counts the call when the final
    /// result is permitted.
    fn decide(
        &self,
        state: &mut MonitorState,
        action: &str,
        resource: &str,
        context: &Context,
    ) -> EvaluationResult {
        let mut result = evaluate(&self.document, action, resource, context);
        let limits = self.document.limits();
        let now_ms = self.clock.now_ms();

        // Denied calls never reach the limiter, so they do not use up quota.
        // `check` asks only the most specific limit; `record` below counts
        // the call against every matching one.
        if result.permitted && state.limiter.check(limits, action, now_ms).exceeded {
            warn!(covenant_id = %self.covenant_id, action, "rate limit exceeded");
            result = result.into_denied(
                format!("Rate limit exceeded for action '{}'", action),
                Severity::High,
            );
        }
        if result.permitted {
            state.limiter.record(limits, action, now_ms);
        } else {
            warn!(
                covenant_id = %self.covenant_id,
                action,
                resource,
                reason = result.reason.as_deref().unwrap_or_default(),
                "action denied"
            );
        }
        result
    }

    fn outcome_for(&self, result: &EvaluationResult) -> Outcome {
        if result.permitted || self.mode() == EnforcementMode::LogOnly {
            Outcome::Executed
        } else {
            Outcome::Denied
        }
    }

    fn draft(
        &self,
        action: &str,
        resource: &str,
        context: &Context,
        result: &EvaluationResult,
        outcome: Outcome,
    ) -> EntryDraft {
        EntryDraft::new(action, resource, EntryResult::from(result), outcome)
            .with_timestamp(self.clock.now())
            .with_context(context.clone())
    }

    fn notify(&self, result: &EvaluationResult, entry: &AuditEntry) {
        if !result.permitted {
            if let Some(callback) = &self.config.on_violation {
                callback(entry);
            }
        }
        if let Some(callback) = &self.config.on_action {
            callback(entry);
        }
    }

    fn enforce(
        &self,
        result: EvaluationResult,
        action: &str,
        resource: &str,
    ) -> Result<EvaluationResult, EnforcementError> {
        if result.permitted || self.mode() == EnforcementMode::LogOnly {
            return Ok(result);
        }
        Err(self.denial(result, action, resource))
    }

    fn denial(&self, result: EvaluationResult, action: &str, resource: &str) -> EnforcementError {
        EnforcementError::ActionDenied {
            action: action.to_string(),
            resource: resource.to_string(),
            reason: result.reason.unwrap_or_else(|| "denied".to_string()),
            matched_rule: result.matched_rule.map(Box::new),
            severity: result.severity,
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("covenant_id", &self.covenant_id)
            .field("statements", &self.document.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use covenant_ccl::ContextValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const POLICY: &str = "\
permit file.read on '/data/**'
deny file.write on '/system/**' severity critical
deny network.send on '**' severity high
";

    fn monitor(config: MonitorConfig) -> Monitor {
        Monitor::new("c".repeat(64), POLICY, config).unwrap()
    }

    #[test]
    fn construction_validates_inputs() {
        assert!(matches!(
            Monitor::new("", POLICY, MonitorConfig::new()),
            Err(EnforcementError::InvalidInput { field: "covenant_id", .. })
        ));
        assert!(matches!(
            Monitor::new("id", "", MonitorConfig::new()),
            Err(EnforcementError::InvalidInput { field: "constraints", .. })
        ));
        assert!(matches!(
            Monitor::new("id", "permit", MonitorConfig::new()),
            Err(EnforcementError::Policy(_))
        ));
    }

    #[test]
    fn empty_action_is_rejected_before_logging() {
        let m = monitor(MonitorConfig::new());
        assert!(matches!(
            m.evaluate("", "/data/x", &Context::new()),
            Err(EnforcementError::InvalidInput { field: "action", .. })
        ));
        assert!(m.get_audit_log().entries.is_empty());
    }

    #[test]
    fn permitted_and_denied_are_both_recorded() {
        let m = monitor(MonitorConfig::new());
        let ok = m.evaluate("file.read", "/data/users", &Context::new()).unwrap();
        assert!(ok.permitted);

        let err = m
            .evaluate("file.write", "/system/config", &Context::new())
            .unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Critical));

        let log = m.get_audit_log();
        assert_eq!(log.count, 2);
        assert_eq!(log.entries[0].outcome, Outcome::Executed);
        assert_eq!(log.entries[1].outcome, Outcome::Denied);
        assert!(m.verify_audit_log_integrity());
    }

    #[test]
    fn default_deny_has_no_matched_rule() {
        let m = monitor(MonitorConfig::new());
        match m.evaluate("file.delete", "/data/users", &Context::new()) {
            Err(EnforcementError::ActionDenied { matched_rule, .. }) => {
                assert!(matched_rule.is_none())
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn log_only_records_executed_and_returns_result() {
        let m = monitor(MonitorConfig::new().with_mode(EnforcementMode::LogOnly));
        let result = m
            .evaluate("network.send", "https://example.com", &Context::new())
            .unwrap();
        assert!(!result.permitted);
        let entry = m.get_audit_entry(0).unwrap();
        assert_eq!(entry.outcome, Outcome::Executed);
        assert!(!entry.result.permitted);
    }

    #[test]
    fn callbacks_fire_in_order() {
        let violations = Arc::new(AtomicUsize::new(0));
        let actions = Arc::new(AtomicUsize::new(0));
        let (v, a) = (violations.clone(), actions.clone());
        let m = monitor(
            MonitorConfig::new()
                .on_violation(move |_| {
                    v.fetch_add(1, Ordering::SeqCst);
                })
                .on_action(move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                }),
        );

        m.evaluate("file.read", "/data/a", &Context::new()).unwrap();
        let _ = m.evaluate("network.send", "x", &Context::new());
        assert_eq!(violations.load(Ordering::SeqCst), 1);
        assert_eq!(actions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn execute_skips_handler_on_denial() {
        let m = monitor(MonitorConfig::new());
        let mut ran = false;
        let result: Result<(), EnforcementError> =
            m.execute("file.write", "/system/passwd", &Context::new(), || {
                ran = true;
                Ok(())
            });
        assert!(result.unwrap_err().is_denial());
        assert!(!ran);
        assert_eq!(m.get_audit_entry(0).unwrap().outcome, Outcome::Denied);
    }

    #[test]
    fn execute_records_handler_failure_as_executed() {
        let m = monitor(MonitorConfig::new());
        let result: Result<u32, EnforcementError> =
            m.execute("file.read", "/data/x", &Context::new(), || {
                Err(EnforcementError::invalid("file", "disk on fire"))
            });
        assert!(matches!(result, Err(EnforcementError::InvalidInput { .. })));

        let entry = m.get_audit_entry(0).unwrap();
        assert_eq!(entry.outcome, Outcome::Executed);
        assert!(entry.error.unwrap().contains("disk on fire"));
    }

    #[test]
    fn execute_returns_handler_value() {
        let m = monitor(MonitorConfig::new());
        let value: Result<u32, EnforcementError> =
            m.execute("file.read", "/data/x", &Context::new(), || Ok(7));
        assert_eq!(value.unwrap(), 7);
    }

    #[test]
    fn entries_carry_clock_time_and_context() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let m = monitor(MonitorConfig::new()).with_clock(clock);
        let mut context = Context::new();
        context.insert("user".into(), ContextValue::from("alice"));
        m.evaluate("file.read", "/data/x", &context).unwrap();

        let entry = m.get_audit_entry(0).unwrap();
        assert_eq!(entry.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(entry.context, context);
    }

    #[test]
    fn rate_limit_overrides_permit() {
        let clock = Arc::new(ManualClock::new(0));
        let m = Monitor::new(
            "id",
            "permit api.call on '**'\nlimit api.call 1 per 1 second",
            MonitorConfig::new(),
        )
        .unwrap()
        .with_clock(clock.clone());

        m.evaluate("api.call", "/x", &Context::new()).unwrap();
        assert!(m.check_rate_limit("api.call").exceeded);
        let err = m.evaluate("api.call", "/x", &Context::new()).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::High));
        assert!(err.to_string().contains("Rate limit exceeded for action 'api.call'"));

        clock.advance_ms(1_000);
        assert!(m.evaluate("api.call", "/x", &Context::new()).is_ok());
    }

    #[test]
    fn denied_calls_do_not_consume_quota() {
        let m = Monitor::new(
            "id",
            "permit api.call on '/ok/**'\nlimit api.call 1 per 1 minute",
            MonitorConfig::new(),
        )
        .unwrap();
        let _ = m.evaluate("api.call", "/nope", &Context::new());
        assert_eq!(m.check_rate_limit("api.call").remaining, Some(1));
    }

    #[test]
    fn reset_clears_log_and_windows() {
        let m = Monitor::new(
            "id",
            "permit api.call on '**'\nlimit api.call 1 per 1 minute",
            MonitorConfig::new(),
        )
        .unwrap();
        m.evaluate("api.call", "/x", &Context::new()).unwrap();
        m.reset();
        assert!(m.get_audit_log().entries.is_empty());
        assert!(m.get_rate_limit_state().is_empty());
        assert_eq!(m.compute_merkle_root(), covenant_audit::GENESIS_HASH);
    }

    #[test]
    fn proof_out_of_range_is_invalid_input() {
        let m = monitor(MonitorConfig::new());
        m.evaluate("file.read", "/data/x", &Context::new()).unwrap();
        assert!(Monitor::verify_merkle_proof(&m.generate_merkle_proof(0).unwrap()));
        assert!(matches!(
            m.generate_merkle_proof(1),
            Err(EnforcementError::InvalidInput { field: "index", .. })
        ));
    }
}
