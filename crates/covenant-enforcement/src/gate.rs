// gate.rs - Capability gate: default deny by construction.
//
// The gate derives its capability set once, from the action patterns of
// the covenant's permit statements. Handlers can only be registered for
// actions inside that set, so an action nothing permits has no code path
// at all. Registered actions still go through full policy evaluation on
// every call, since a deny rule or a failed condition can narrow a permit.
//
// Every execute call lands in the execution log with one of three
// outcomes: EXECUTED (handler ran, successfully or not), DENIED (policy
// said no) or IMPOSSIBLE (no handler, whether or not a permit exists).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use covenant_ccl::{evaluate, match_action, Context, PolicyDocument};
use covenant_crypto::KeyPair;

use crate::clock::{Clock, SystemClock};
use crate::error::{require_non_empty, BoxError, EnforcementError};
use crate::manifest::{CapabilityGrant, CapabilityManifest};

/// A registered action implementation. Receives the resource and context.
pub type GateHandler =
    Box<dyn Fn(&str, &Context) -> Result<serde_json::Value, BoxError> + Send + Sync>;

/// Outcome code of one gate execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    Executed,
    Denied,
    Impossible,
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Executed => write!(f, "EXECUTED"),
            ExecutionOutcome::Denied => write!(f, "DENIED"),
            ExecutionOutcome::Impossible => write!(f, "IMPOSSIBLE"),
        }
    }
}

/// One line of the gate's execution history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionLogEntry {
    pub action: String,
    pub resource: String,
    pub outcome: ExecutionOutcome,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer to "which of these actions could this runtime ever perform?".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImpossibilityProof {
    pub possible: Vec<String>,
    pub impossible: Vec<String>,
    /// Hash of a manifest generated for this answer.
    pub manifest_hash: String,
}

/// Executes registered handlers for actions a covenant permits.
pub struct CapabilityGate {
    covenant_id: String,
    document: PolicyDocument,
    key_pair: KeyPair,
    runtime_type: String,
    capabilities: Vec<String>,
    handlers: HashMap<String, GateHandler>,
    execution_log: Mutex<Vec<ExecutionLogEntry>>,
    clock: Arc<dyn Clock>,
}

impl CapabilityGate {
    /// Parse `constraints` and derive the capability set.
    pub fn from_constraints(
        covenant_id: impl Into<String>,
        constraints: &str,
        key_pair: KeyPair,
        runtime_type: impl Into<String>,
    ) -> Result<Self, EnforcementError> {
        let covenant_id = covenant_id.into();
        let runtime_type = runtime_type.into();
        require_non_empty("covenant_id", &covenant_id)?;
        require_non_empty("constraints", constraints)?;
        require_non_empty("runtime_type", &runtime_type)?;
        let document = covenant_ccl::parse(constraints)?;

        let mut capabilities: Vec<String> = Vec::new();
        for permit in document.permits() {
            if !capabilities.contains(&permit.action) {
                capabilities.push(permit.action.clone());
            }
        }
        debug!(
            covenant_id = %covenant_id,
            capabilities = capabilities.len(),
            "capability set derived"
        );

        Ok(Self {
            covenant_id,
            document,
            key_pair,
            runtime_type,
            capabilities,
            handlers: HashMap::new(),
            execution_log: Mutex::new(Vec::new()),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn covenant_id(&self) -> &str {
        &self.covenant_id
    }

    pub fn runtime_type(&self) -> &str {
        &self.runtime_type
    }

    /// Attach a handler to `action`. Fails when no permit grants it.
    /// Registering twice replaces the earlier handler.
    pub fn register<F>(&mut self, action: &str, handler: F) -> Result<(), EnforcementError>
    where
        F: Fn(&str, &Context) -> Result<serde_json::Value, BoxError> + Send + Sync + 'static,
    {
        require_non_empty("action", action)?;
        if !self.has_capability(action) {
            warn!(covenant_id = %self.covenant_id, action, "refusing handler outside capability set");
            return Err(EnforcementError::CapabilityMissing {
                action: action.to_string(),
            });
        }
        self.handlers.insert(action.to_string(), Box::new(handler));
        info!(covenant_id = %self.covenant_id, action, "handler registered");
        Ok(())
    }

    /// Run the handler for `action` if one is registered and the policy
    /// permits this call.
    pub fn execute(
        &self,
        action: &str,
        resource: &str,
        context: &Context,
    ) -> Result<serde_json::Value, EnforcementError> {
        require_non_empty("action", action)?;

        let Some(handler) = self.handlers.get(action) else {
            let err = if self.has_capability(action) {
                EnforcementError::CapabilityUnbound {
                    action: action.to_string(),
                }
            } else {
                EnforcementError::CapabilityMissing {
                    action: action.to_string(),
                }
            };
            warn!(action, resource, error = %err, "impossible action");
            self.record(action, resource, ExecutionOutcome::Impossible, Some(err.to_string()));
            return Err(err);
        };

        let result = evaluate(&self.document, action, resource, context);
        if !result.permitted {
            let reason = result.reason.unwrap_or_else(|| "denied".to_string());
            warn!(action, resource, reason = %reason, "gate denied action");
            self.record(action, resource, ExecutionOutcome::Denied, Some(reason.clone()));
            return Err(EnforcementError::ActionDenied {
                action: action.to_string(),
                resource: resource.to_string(),
                reason,
                matched_rule: result.matched_rule.map(Box::new),
                severity: result.severity,
            });
        }

        match handler(resource, context) {
            Ok(value) => {
                self.record(action, resource, ExecutionOutcome::Executed, None);
                Ok(value)
            }
            Err(source) => {
                self.record(
                    action,
                    resource,
                    ExecutionOutcome::Executed,
                    Some(source.to_string()),
                );
                Err(EnforcementError::Handler {
                    action: action.to_string(),
                    source,
                })
            }
        }
    }

    /// Whether any permit pattern covers `action`.
    pub fn has_capability(&self, action: &str) -> bool {
        self.capabilities
            .iter()
            .any(|pattern| match_action(pattern, action))
    }

    /// Permit action patterns, in declaration order without repeats.
    pub fn list_capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    /// Build and sign a manifest of every permit statement.
    pub fn generate_manifest(&self) -> Result<CapabilityManifest, EnforcementError> {
        let grants = self
            .document
            .permits()
            .iter()
            .map(CapabilityGrant::from)
            .collect();
        let manifest = CapabilityManifest::issue(
            &self.covenant_id,
            grants,
            &self.runtime_type,
            &self.key_pair,
            self.clock.now(),
        )?;
        info!(
            covenant_id = %self.covenant_id,
            manifest_hash = %manifest.manifest_hash,
            "capability manifest generated"
        );
        Ok(manifest)
    }

    /// Check a manifest's hash and signature.
    pub fn verify_manifest(manifest: &CapabilityManifest) -> bool {
        manifest.verify()
    }

    /// Split `actions` by whether the capability set covers them.
    pub fn prove_impossible<S: AsRef<str>>(
        &self,
        actions: &[S],
    ) -> Result<ImpossibilityProof, EnforcementError> {
        let (possible, impossible): (Vec<String>, Vec<String>) = actions
            .iter()
            .map(|a| a.as_ref().to_string())
            .partition(|a| self.has_capability(a));
        let manifest = self.generate_manifest()?;
        Ok(ImpossibilityProof {
            possible,
            impossible,
            manifest_hash: manifest.manifest_hash,
        })
    }

    pub fn get_execution_log(&self) -> Vec<ExecutionLogEntry> {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<ExecutionLogEntry>> {
        self.execution_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, action: &str, resource: &str, outcome: ExecutionOutcome, error: Option<String>) {
        self.log().push(ExecutionLogEntry {
            action: action.to_string(),
            resource: resource.to_string(),
            outcome,
            timestamp: self.clock.now(),
            error,
        });
    }
}

impl std::fmt::Debug for CapabilityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityGate")
            .field("covenant_id", &self.covenant_id)
            .field("runtime_type", &self.runtime_type)
            .field("capabilities", &self.capabilities)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
