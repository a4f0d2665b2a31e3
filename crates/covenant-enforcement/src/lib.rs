//! # covenant-enforcement
//!
//! Runtime enforcement of covenant constraints.
//!
//! Two strategies, usable together or alone:
//!
//! - [`Monitor`] decides each action at call time, applies `limit`
//!   statements, and appends every decision to a hash-chained audit log
//!   that supports Merkle inclusion proofs.
//! - [`CapabilityGate`] derives a fixed capability set from the permit
//!   statements, only accepts handlers inside that set, and signs
//!   [`CapabilityManifest`]s describing it.
//!
//! ## Quick Example
//!
//! ```rust
//! use covenant_ccl::Context;
//! use covenant_enforcement::{Monitor, MonitorConfig};
//!
//! let monitor = Monitor::new(
//!     "a".repeat(64),
//!     "permit file.read on '/data/**'\ndeny file.write on '/system/**' severity critical",
//!     MonitorConfig::new(),
//! ).unwrap();
//!
//! assert!(monitor.evaluate("file.read", "/data/users", &Context::new()).is_ok());
//! assert!(monitor.evaluate("file.write", "/system/config", &Context::new()).is_err());
//! assert_eq!(monitor.get_audit_log().count, 2);
//! assert!(monitor.verify_audit_log_integrity());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod manifest;
pub mod monitor;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    EnforcementMode, EntryCallback, FailureMode, GateSettings, MonitorConfig, MonitorSettings,
    DEFAULT_RUNTIME_TYPE,
};
pub use error::{BoxError, EnforcementError};
pub use gate::{CapabilityGate, ExecutionLogEntry, ExecutionOutcome, GateHandler, ImpossibilityProof};
pub use manifest::{CapabilityGrant, CapabilityManifest};
pub use monitor::Monitor;
pub use rate_limit::{RateLimitState, RateLimitStatus, RateLimiter};
