// config.rs - covenant.toml loading.
//
// Every table is optional. A missing default file means all defaults; an
// explicitly named file that cannot be read is an error.

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use covenant_enforcement::{GateSettings, MonitorSettings};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "covenant.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directives used when RUST_LOG is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "covenant=info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_enforcement::EnforcementMode;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = CliConfig::from_toml("").unwrap();
        assert_eq!(config.monitor.mode, EnforcementMode::Enforce);
        assert_eq!(config.gate.runtime_type, "rust");
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.log.filter, "covenant=info");
    }

    #[test]
    fn tables_override_defaults() {
        let config = CliConfig::from_toml(
            r#"
[monitor]
mode = "log_only"

[gate]
runtime_type = "wasm"

[log]
format = "json"
filter = "covenant_enforcement=debug"
"#,
        )
        .unwrap();
        assert_eq!(config.monitor.mode, EnforcementMode::LogOnly);
        assert_eq!(config.gate.runtime_type, "wasm");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter, "covenant_enforcement=debug");
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("covenant.toml");
        std::fs::write(&path, "[monitor]\nmode = \"log_only\"\n").unwrap();
        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.monitor.mode, EnforcementMode::LogOnly);
    }
}
