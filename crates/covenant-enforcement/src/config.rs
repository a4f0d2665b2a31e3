// config.rs - Monitor and gate configuration.
//
// The serializable parts (`MonitorSettings`, `GateSettings`) load from the
// `[monitor]` and `[gate]` tables of a TOML file. Callbacks cannot be
// serialized, so `MonitorConfig` wraps the settings and adds them through
// builder methods.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use covenant_audit::AuditEntry;

/// What the monitor does with a denial.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Denials are recorded and returned to the caller as errors.
    #[default]
    Enforce,
    /// Denials are recorded as executed and never returned as errors.
    /// Callers inspect `EvaluationResult::permitted` themselves.
    LogOnly,
}

impl std::fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnforcementMode::Enforce => write!(f, "enforce"),
            EnforcementMode::LogOnly => write!(f, "log_only"),
        }
    }
}

/// Behaviour when the decision itself cannot be reached.
///
/// Accepted for forward compatibility; the monitor currently has no
/// failure path where this is consulted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    #[default]
    FailClosed,
    FailOpen,
}

/// Serializable monitor options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorSettings {
    #[serde(default)]
    pub mode: EnforcementMode,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

/// Callback receiving a freshly appended audit entry.
pub type EntryCallback = Arc<dyn Fn(&AuditEntry) + Send + Sync>;

/// Full monitor configuration: settings plus optional callbacks.
#[derive(Clone, Default)]
pub struct MonitorConfig {
    pub settings: MonitorSettings,
    pub(crate) on_violation: Option<EntryCallback>,
    pub(crate) on_action: Option<EntryCallback>,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_mode(mut self, mode: EnforcementMode) -> Self {
        self.settings.mode = mode;
        self
    }

    /// Called with the entry of every denied evaluation, before `on_action`.
    pub fn on_violation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AuditEntry) + Send + Sync + 'static,
    {
        self.on_violation = Some(Arc::new(callback));
        self
    }

    /// Called with the entry of every evaluation.
    pub fn on_action<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AuditEntry) + Send + Sync + 'static,
    {
        self.on_action = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("settings", &self.settings)
            .field("on_violation", &self.on_violation.is_some())
            .field("on_action", &self.on_action.is_some())
            .finish()
    }
}

/// Runtime label stamped into capability manifests when none is given.
pub const DEFAULT_RUNTIME_TYPE: &str = "rust";

fn default_runtime_type() -> String {
    DEFAULT_RUNTIME_TYPE.to_string()
}

/// Serializable gate options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateSettings {
    #[serde(default = "default_runtime_type")]
    pub runtime_type: String,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            runtime_type: default_runtime_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enforce_and_fail_closed() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.mode, EnforcementMode::Enforce);
        assert_eq!(settings.failure_mode, FailureMode::FailClosed);
        assert_eq!(GateSettings::default().runtime_type, "rust");
    }

    #[test]
    fn settings_load_from_toml() {
        let settings: MonitorSettings =
            toml::from_str("mode = \"log_only\"\nfailure_mode = \"fail_open\"").unwrap();
        assert_eq!(settings.mode, EnforcementMode::LogOnly);
        assert_eq!(settings.failure_mode, FailureMode::FailOpen);

        let empty: MonitorSettings = toml::from_str("").unwrap();
        assert_eq!(empty, MonitorSettings::default());

        let gate: GateSettings = toml::from_str("").unwrap();
        assert_eq!(gate.runtime_type, DEFAULT_RUNTIME_TYPE);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(toml::from_str::<MonitorSettings>("mode = \"audit\"").is_err());
    }

    #[test]
    fn builder_records_callbacks() {
        let config = MonitorConfig::new()
            .with_mode(EnforcementMode::LogOnly)
            .on_action(|_| {});
        assert_eq!(config.settings.mode, EnforcementMode::LogOnly);
        assert!(config.on_action.is_some());
        assert!(config.on_violation.is_none());
        assert!(format!("{:?}", config).contains("on_action: true"));
    }

    #[test]
    fn mode_display() {
        assert_eq!(EnforcementMode::Enforce.to_string(), "enforce");
        assert_eq!(EnforcementMode::LogOnly.to_string(), "log_only");
    }
}
