//! `arbor variables` - List well-known or resolved variables

use super::OutputFormat;
use super::build::resolve_build;
use anyhow::Result;
use arbor::executor::ProcessSupervisor;
use arbor::infrastructure::Config;
use arbor::variables::{VariableSet, WELL_KNOWN_VARIABLES};
use serde_json::{Map, Value, json};
use std::fmt::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Renders the well-known variable registry
pub fn render_well_known(format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<Value> = WELL_KNOWN_VARIABLES
                .iter()
                .map(|d| {
                    json!({
                        "name": d.name,
                        "description": d.description,
                        "default": d.default,
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&entries)?)
        }
        OutputFormat::Text => {
            let width = WELL_KNOWN_VARIABLES
                .iter()
                .map(|d| d.name.len())
                .max()
                .unwrap_or(0);
            let mut out = String::new();
            for descriptor in WELL_KNOWN_VARIABLES {
                let default = descriptor
                    .default
                    .map(|d| format!(" (default: {d})"))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "{:width$}  {}{default}",
                    descriptor.name, descriptor.description
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Renders a resolved variable set
pub fn render_variables(variables: &VariableSet, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let map: Map<String, Value> = variables
                .iter()
                .map(|v| {
                    let value = v.value.clone().map_or(Value::Null, Value::String);
                    (v.key.clone(), value)
                })
                .collect();
            Ok(serde_json::to_string_pretty(&Value::Object(map))?)
        }
        OutputFormat::Text => Ok(variables
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Resolves the build variables for `args` and renders them
pub async fn render_resolved(
    config: &Config,
    args: &[String],
    cwd: &Path,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<String> {
    let build = resolve_build(config, args, cwd, &ProcessSupervisor::new(), cancel).await?;
    render_variables(&build.variables, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::variables::well_known::SOURCE_ROOT;

    #[test]
    fn test_well_known_text_lists_every_key() {
        let text = render_well_known(OutputFormat::Text).unwrap();
        assert_eq!(text.lines().count(), WELL_KNOWN_VARIABLES.len());
        assert!(text.contains(SOURCE_ROOT));
    }

    #[test]
    fn test_well_known_json() {
        let json = render_well_known(OutputFormat::Json).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), WELL_KNOWN_VARIABLES.len());
        assert!(parsed[0]["name"].is_string());
    }

    #[test]
    fn test_render_variables() {
        let mut variables = VariableSet::new();
        variables.set("B", "2");
        variables.set("a", "1");

        assert_eq!(render_variables(&variables, OutputFormat::Text).unwrap(), "a=1\nB=2");
        let json: Value =
            serde_json::from_str(&render_variables(&variables, OutputFormat::Json).unwrap())
                .unwrap();
        assert_eq!(json["B"], "2");
    }
}
