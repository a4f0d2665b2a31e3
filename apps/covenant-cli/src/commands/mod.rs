pub mod audit;
pub mod check;
pub mod keygen;
pub mod manifest;
pub mod replay;

use std::path::Path;

use anyhow::{bail, Context as _};
use serde::Serialize;

use covenant_ccl::{Context, ContextValue};

/// Read a CCL constraints file.
pub fn read_constraints(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read constraints {}", path.display()))
}

/// Read and deserialize a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Write `value` as pretty JSON to `path`, or to stdout when `path` is None.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

/// Parse repeated `key=value` flags into an evaluation context.
///
/// `true`, `false` and `null` become their scalar types, anything that
/// parses as a number becomes a number, and everything else is a string.
pub fn parse_context(pairs: &[String]) -> anyhow::Result<Context> {
    let mut context = Context::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("context entry '{}' is not KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("context entry '{}' has an empty key", pair);
        }
        context.insert(key.to_string(), parse_scalar(raw));
    }
    Ok(context)
}

fn parse_scalar(raw: &str) -> ContextValue {
    match raw {
        "true" => ContextValue::Bool(true),
        "false" => ContextValue::Bool(false),
        "null" => ContextValue::Null,
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => ContextValue::Number(n),
            _ => ContextValue::String(raw.to_string()),
        },
    }
}
