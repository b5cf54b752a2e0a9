use serde::Serialize;

use crate::cli::{OutputFormat, ScenariosArgs};
use crate::config_file::load_config;
use crate::run_error::RunError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioLine<'a> {
    name: &'a str,
    #[serde(flatten)]
    settings: &'a vuload_core::ScenarioSettings,
}

/// Prints the scenario names in the config together with the values they set.
pub async fn list(args: ScenariosArgs) -> Result<(), RunError> {
    let config = load_config(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;

    match args.output {
        OutputFormat::Json => {
            let lines: Vec<_> = config
                .scenarios
                .iter()
                .map(|(name, settings)| ScenarioLine { name, settings })
                .collect();
            let doc = serde_json::to_string_pretty(&lines)
                .map_err(|err| RunError::RuntimeError(err.into()))?;
            println!("{doc}");
        }
        OutputFormat::HumanReadable => {
            if config.scenarios.is_empty() {
                println!("(no scenarios)");
            }
            for (name, settings) in &config.scenarios {
                println!("{name}: {}", describe(settings));
            }
        }
    }

    Ok(())
}

fn describe(s: &vuload_core::ScenarioSettings) -> String {
    let mut parts = Vec::new();
    if let Some(v) = s.vus {
        parts.push(format!("vus={v}"));
    }
    if let Some(v) = s.duration_seconds {
        parts.push(format!("duration={v}s"));
    }
    if let Some(v) = s.ramp_up_seconds {
        parts.push(format!("ramp_up={v}s"));
    }
    match (s.think_time_min_ms, s.think_time_max_ms) {
        (None, None) => {}
        (min, max) => parts.push(format!(
            "think={}..{}ms",
            min.map_or_else(|| "-".to_string(), |v| v.to_string()),
            max.map_or_else(|| "-".to_string(), |v| v.to_string())
        )),
    }
    if let Some(v) = s.error_injection_rate_percent {
        parts.push(format!("error_injection={v}%"));
    }
    if parts.is_empty() {
        parts.push("defaults".to_string());
    }

    let mut line = parts.join(" ");
    if let Some(d) = &s.description {
        line.push_str(" | ");
        line.push_str(d);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use vuload_core::ScenarioSettings;

    #[test]
    fn describe_lists_only_set_values() {
        let s = ScenarioSettings {
            description: Some("steady".to_string()),
            vus: Some(5),
            duration_seconds: Some(60),
            think_time_max_ms: Some(200),
            ..ScenarioSettings::default()
        };
        assert_eq!(describe(&s), "vus=5 duration=60s think=-..200ms | steady");
        assert_eq!(describe(&ScenarioSettings::default()), "defaults");
    }
}
