// replay.rs - Run a recorded request stream through one monitor.
//
// Each non-blank line of the input is a JSON request. Denials do not stop
// the replay; they are counted and remain in the audit log like any other
// decision. Malformed lines and invalid requests abort with the line number.

use std::io::BufRead;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use covenant_ccl::Context;
use covenant_enforcement::{EnforcementError, Monitor, MonitorConfig};

use crate::config::CliConfig;

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub action: String,
    #[serde(default = "any_resource")]
    pub resource: String,
    #[serde(default)]
    pub context: Context,
}

fn any_resource() -> String {
    "**".to_string()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub permitted: usize,
    pub denied: usize,
}

impl ReplaySummary {
    pub fn total(&self) -> usize {
        self.permitted + self.denied
    }
}

/// Feed every request in `input` to `monitor`.
pub fn replay(monitor: &Monitor, input: impl BufRead) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("failed to read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }
        let request: ReplayRequest = serde_json::from_str(&line)
            .with_context(|| format!("invalid request on line {}", line_no))?;

        match monitor.evaluate(&request.action, &request.resource, &request.context) {
            Ok(result) if result.permitted => summary.permitted += 1,
            Ok(_) => summary.denied += 1,
            Err(err @ EnforcementError::ActionDenied { .. }) => {
                tracing::debug!(line = line_no, error = %err, "request denied");
                summary.denied += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("request on line {} failed", line_no))
            }
        }
    }
    Ok(summary)
}

pub fn execute(
    config: &CliConfig,
    constraints: &Path,
    covenant_id: &str,
    requests: &Path,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let source = super::read_constraints(constraints)?;
    let monitor = Monitor::new(
        covenant_id,
        &source,
        MonitorConfig::new().with_settings(config.monitor),
    )?;

    let file = std::fs::File::open(requests)
        .with_context(|| format!("failed to open {}", requests.display()))?;
    let summary = replay(&monitor, std::io::BufReader::new(file))?;

    let log = monitor.get_audit_log();
    if let Some(out) = out {
        super::write_json(Some(out), &log)?;
        tracing::info!(path = %out.display(), entries = log.count, "audit log written");
    }

    println!(
        "Replayed {} request(s): {} permitted, {} denied.",
        summary.total(),
        summary.permitted,
        summary.denied
    );
    println!("Merkle root: {}", log.merkle_root);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_enforcement::EnforcementMode;

    const POLICY: &str = "permit file.read on '/data/**'\ndeny network.send on '**' severity high";

    fn monitor(mode: EnforcementMode) -> Monitor {
        Monitor::new("id", POLICY, MonitorConfig::new().with_mode(mode)).unwrap()
    }

    const REQUESTS: &str = r#"{"action": "file.read", "resource": "/data/a"}

{"action": "network.send", "resource": "https://example.com"}
{"action": "file.read", "resource": "/data/b", "context": {"user": "alice"}}
"#;

    #[test]
    fn counts_decisions_and_keeps_going_after_denials() {
        let m = monitor(EnforcementMode::Enforce);
        let summary = replay(&m, REQUESTS.as_bytes()).unwrap();
        assert_eq!(summary, ReplaySummary { permitted: 2, denied: 1 });
        assert_eq!(m.get_audit_log().count, 3);
        assert!(m.verify_audit_log_integrity());
    }

    #[test]
    fn log_only_counts_denials_too() {
        let m = monitor(EnforcementMode::LogOnly);
        let summary = replay(&m, REQUESTS.as_bytes()).unwrap();
        assert_eq!(summary.denied, 1);
    }

    #[test]
    fn missing_resource_defaults_to_any() {
        let m = monitor(EnforcementMode::Enforce);
        replay(&m, r#"{"action": "network.send"}"#.as_bytes()).unwrap();
        assert_eq!(m.get_audit_entry(0).unwrap().resource, "**");
    }

    #[test]
    fn bad_line_reports_its_number() {
        let m = monitor(EnforcementMode::Enforce);
        let err = replay(&m, "{\"action\": \"file.read\"}\nnot json\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_action_aborts() {
        let m = monitor(EnforcementMode::Enforce);
        assert!(replay(&m, r#"{"action": ""}"#.as_bytes()).is_err());
        assert!(m.get_audit_log().entries.is_empty());
    }
}
