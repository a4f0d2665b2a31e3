// error.rs - Error types for runtime enforcement.

use thiserror::Error;

use covenant_audit::AuditError;
use covenant_ccl::{CclError, Severity, Statement};
use covenant_crypto::CryptoError;

/// Error returned by a gate handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the monitor and the capability gate.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// A caller-supplied argument was empty or out of range.
    /// Raised before anything is recorded.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Policy or rate-limit denial in enforce mode. The audit entry for the
    /// call has already been appended when this is returned.
    #[error("action '{action}' on '{resource}' denied: {reason}")]
    ActionDenied {
        action: String,
        resource: String,
        reason: String,
        matched_rule: Option<Box<Statement>>,
        severity: Option<Severity>,
    },

    /// No permit statement grants the action, so it can never run.
    #[error("action '{action}' is impossible: no permit statement grants it")]
    CapabilityMissing { action: String },

    /// The action is granted but nothing was registered to perform it.
    #[error("action '{action}' is impossible: no handler registered")]
    CapabilityUnbound { action: String },

    /// A gate handler ran and failed.
    #[error("handler for '{action}' failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: BoxError,
    },

    #[error("policy error: {0}")]
    Policy(#[from] CclError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl EnforcementError {
    /// True for policy and rate-limit denials.
    pub fn is_denial(&self) -> bool {
        matches!(self, EnforcementError::ActionDenied { .. })
    }

    /// True when the action is outside what the gate can ever perform.
    pub fn is_impossible(&self) -> bool {
        matches!(
            self,
            EnforcementError::CapabilityMissing { .. } | EnforcementError::CapabilityUnbound { .. }
        )
    }

    /// Severity of a denial, when the deciding rule carried one.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            EnforcementError::ActionDenied { severity, .. } => *severity,
            _ => None,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EnforcementError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Reject empty identifiers before any state is touched.
pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), EnforcementError> {
    if value.trim().is_empty() {
        return Err(EnforcementError::invalid(field, "must not be empty"));
    }
    Ok(())
}
