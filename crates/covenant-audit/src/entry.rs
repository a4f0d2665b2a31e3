// entry.rs - Audit entry data model.
//
// Every evaluate/execute call produces one AuditEntry. Entries form a
// chain: `previous_hash` links to the prior entry's `hash`, and `hash` is a
// digest of every other field, so editing any recorded field is detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covenant_ccl::{Context, EvaluationResult, Severity};

use crate::error::AuditError;

/// Whether the recorded action went ahead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Executed,
    Denied,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Executed => write!(f, "EXECUTED"),
            Outcome::Denied => write!(f, "DENIED"),
        }
    }
}

/// The part of an evaluation result kept in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryResult {
    pub permitted: bool,
    pub reason: Option<String>,
    pub severity: Option<Severity>,
}

impl EntryResult {
    /// A bare permitted result with no reason.
    pub fn permitted() -> Self {
        Self {
            permitted: true,
            reason: None,
            severity: None,
        }
    }

    /// A denied result.
    pub fn denied(reason: impl Into<String>, severity: Option<Severity>) -> Self {
        Self {
            permitted: false,
            reason: Some(reason.into()),
            severity,
        }
    }
}

impl From<&EvaluationResult> for EntryResult {
    fn from(result: &EvaluationResult) -> Self {
        Self {
            permitted: result.permitted,
            reason: result.reason.clone(),
            severity: result.severity,
        }
    }
}

/// A single link in the audit hash chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Position in the log, starting at 0.
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub context: Context,
    pub result: EntryResult,
    pub outcome: Outcome,
    /// `hash` of the previous entry, or the genesis hash for the first one.
    pub previous_hash: String,
    /// SHA-256 of the canonical content of every other field.
    pub hash: String,
    /// Message of a handler failure, if the handler ran and failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything hashed for an entry: all fields except `hash` itself.
#[derive(Serialize)]
struct EntryContent<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    action: &'a str,
    resource: &'a str,
    context: &'a Context,
    result: &'a EntryResult,
    outcome: Outcome,
    previous_hash: &'a str,
    error: Option<&'a str>,
}

impl AuditEntry {
    /// Recompute this entry's content hash from its current fields.
    pub fn compute_hash(&self) -> Result<String, AuditError> {
        let content = EntryContent {
            index: self.index,
            timestamp: &self.timestamp,
            action: &self.action,
            resource: &self.resource,
            context: &self.context,
            result: &self.result,
            outcome: self.outcome,
            previous_hash: &self.previous_hash,
            error: self.error.as_deref(),
        };
        Ok(covenant_crypto::hash_object(&content)?)
    }
}

/// The caller-supplied part of an entry. The chain fills in
/// `index`, `previous_hash` and `hash` on append.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub resource: String,
    pub context: Context,
    pub result: EntryResult,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl EntryDraft {
    /// Start a draft stamped with the current time and an empty context.
    pub fn new(
        action: impl Into<String>,
        resource: impl Into<String>,
        result: EntryResult,
        outcome: Outcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            resource: resource.into(),
            context: Context::new(),
            result,
            outcome,
            error: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_ccl::ContextValue;

    fn sample_entry() -> AuditEntry {
        let mut context = Context::new();
        context.insert("user".into(), ContextValue::from("alice"));
        AuditEntry {
            index: 0,
            timestamp: Utc::now(),
            action: "file.read".into(),
            resource: "/data/users".into(),
            context,
            result: EntryResult::permitted(),
            outcome: Outcome::Executed,
            previous_hash: crate::GENESIS_HASH.into(),
            hash: String::new(),
            error: None,
        }
    }

    #[test]
    fn hash_ignores_the_hash_field() {
        let mut entry = sample_entry();
        let before = entry.compute_hash().unwrap();
        entry.hash = "anything".into();
        assert_eq!(entry.compute_hash().unwrap(), before);
    }

    #[test]
    fn hash_covers_every_other_field() {
        let base = sample_entry();
        let original = base.compute_hash().unwrap();

        let mut changed = base.clone();
        changed.action = "file.write".into();
        assert_ne!(changed.compute_hash().unwrap(), original);

        let mut changed = base.clone();
        changed.previous_hash = "1".repeat(64);
        assert_ne!(changed.compute_hash().unwrap(), original);

        let mut changed = base.clone();
        changed.outcome = Outcome::Denied;
        assert_ne!(changed.compute_hash().unwrap(), original);

        let mut changed = base.clone();
        changed.error = Some("boom".into());
        assert_ne!(changed.compute_hash().unwrap(), original);

        let mut changed = base;
        changed.context.insert("user".into(), ContextValue::from("mallory"));
        assert_ne!(changed.compute_hash().unwrap(), original);
    }

    #[test]
    fn outcome_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Outcome::Executed).unwrap(),
            "\"EXECUTED\""
        );
        assert_eq!(Outcome::Denied.to_string(), "DENIED");
    }

    #[test]
    fn hash_survives_json_round_trip() {
        let mut entry = sample_entry();
        entry.hash = entry.compute_hash().unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let restored: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.compute_hash().unwrap(), entry.hash);
    }
}
