// check.rs - Evaluate one action against a constraints file.

use std::path::Path;

use serde_json::json;

use covenant_enforcement::{EnforcementError, Monitor, MonitorConfig};

use crate::config::CliConfig;

pub fn execute(
    config: &CliConfig,
    constraints: &Path,
    covenant_id: &str,
    action: &str,
    resource: &str,
    context: &[String],
) -> anyhow::Result<()> {
    let source = super::read_constraints(constraints)?;
    let monitor = Monitor::new(
        covenant_id,
        &source,
        MonitorConfig::new().with_settings(config.monitor),
    )?;
    let context = super::parse_context(context)?;

    match monitor.evaluate(action, resource, &context) {
        Ok(result) => {
            let entry = monitor.get_audit_entry(0);
            super::write_json(None, &json!({ "result": result, "entry": entry }))
        }
        Err(err) => {
            if let EnforcementError::ActionDenied {
                reason,
                matched_rule,
                severity,
                ..
            } = &err
            {
                let entry = monitor.get_audit_entry(0);
                super::write_json(
                    None,
                    &json!({
                        "result": {
                            "permitted": false,
                            "matched_rule": matched_rule,
                            "reason": reason,
                            "severity": severity,
                        },
                        "entry": entry,
                    }),
                )?;
                anyhow::bail!("{}", err);
            }
            Err(err.into())
        }
    }
}
