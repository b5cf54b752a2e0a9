use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "loadtest.config.json";
pub const DEFAULT_SCENARIO: &str = "smoke";
pub const DEFAULT_OUTPUT_DIR: &str = "loadtest-output";

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 30s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 30s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 30s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 30s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Run header, live progress bar and a readable summary.
    HumanReadable,
    /// Print the full report as one JSON document on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "vuload",
    author,
    version,
    about = "Virtual-user load generator for HTTP APIs",
    long_about = "vuload drives a pool of virtual users against an HTTP API for a fixed duration.\n\nEach virtual user logs in when auth is enabled, picks weighted endpoints from the config, captures ids from responses and records every outcome. The run ends with a report (latency percentiles, status codes, normalized top errors, failure samples) printed to stdout and written to the output directory.",
    after_help = "Examples:\n  vuload run --config loadtest.config.json --scenario smoke\n  vuload run --config load.yaml --scenario stress --vus 50 --duration 2m --ramp-up 30s\n  vuload run --config loadtest.config.json --base-url https://staging.example.com --insecure\n  vuload scenarios --config loadtest.config.json"
)]
pub struct Cli {
    /// Log debug events to stderr (RUST_LOG takes precedence when set)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one scenario from a config file
    #[command(
        long_about = "Run one named scenario from the config file.\n\nCLI flags override values from the config document; the document overrides built-in defaults."
    )]
    Run(RunArgs),

    /// List the scenarios defined in a config file
    Scenarios(ScenariosArgs),
}

#[derive(Debug, Args)]
pub struct ScenariosArgs {
    /// Path to the config file (.json, .yaml or .yml)
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the config file (.json, .yaml or .yml)
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Scenario name from the config's `scenarios` map
    #[arg(long, short = 's', default_value = DEFAULT_SCENARIO)]
    pub scenario: String,

    /// Override `baseUrl`
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the number of virtual users
    #[arg(long)]
    pub vus: Option<u64>,

    /// Override the run duration in whole seconds (e.g. 30, 30s, 2m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Override the ramp-up window (e.g. 5s, 2500ms)
    #[arg(long, value_parser = parse_duration)]
    pub ramp_up: Option<Duration>,

    /// Override the minimum think time in milliseconds
    #[arg(long)]
    pub think_min: Option<u64>,

    /// Override the maximum think time in milliseconds
    #[arg(long)]
    pub think_max: Option<u64>,

    /// Per-request timeout (minimum 1s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Base seed for the per-VU random generators
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip TLS certificate verification (self-signed dev targets)
    #[arg(long)]
    pub insecure: bool,

    /// Replace the password of every configured account
    #[arg(long, env = "VULOAD_AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Directory for the report files
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum number of failure samples kept in the report
    #[arg(long)]
    pub failure_samples: Option<usize>,

    /// Maximum number of concurrent in-flight requests across all VUs
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

impl RunArgs {
    pub fn run_config(&self) -> vuload_core::RunConfig {
        vuload_core::RunConfig {
            base_url: self.base_url.clone(),
            vus: self.vus,
            duration: self.duration,
            ramp_up: self.ramp_up,
            think_time_min_ms: self.think_min,
            think_time_max_ms: self.think_max,
            auth_password: self.auth_password.clone(),
            request_timeout: self.timeout,
            seed: self.seed,
            failure_sample_cap: self.failure_samples,
            insecure_tls: self.insecure,
            max_connections: self.max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn cli_parses_run_overrides() {
        let parsed = Cli::try_parse_from([
            "vuload",
            "run",
            "--config",
            "load.yaml",
            "--scenario",
            "stress",
            "--base-url",
            "http://127.0.0.1:8080",
            "--vus",
            "25",
            "--duration",
            "1m",
            "--ramp-up",
            "2500ms",
            "--think-min",
            "0",
            "--think-max",
            "50",
            "--timeout",
            "5s",
            "--seed",
            "7",
            "--insecure",
            "--auth-password",
            "s3cret",
            "--failure-samples",
            "3",
            "--output",
            "json",
            "-v",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        assert!(cli.verbose);

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config, PathBuf::from("load.yaml"));
                assert_eq!(args.scenario, "stress");
                assert_eq!(args.output, OutputFormat::Json);

                let cfg = args.run_config();
                assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:8080"));
                assert_eq!(cfg.vus, Some(25));
                assert_eq!(cfg.duration, Some(Duration::from_secs(60)));
                assert_eq!(cfg.ramp_up, Some(Duration::from_millis(2500)));
                assert_eq!(cfg.think_time_min_ms, Some(0));
                assert_eq!(cfg.think_time_max_ms, Some(50));
                assert_eq!(cfg.request_timeout, Some(Duration::from_secs(5)));
                assert_eq!(cfg.seed, Some(7));
                assert!(cfg.insecure_tls);
                assert_eq!(cfg.auth_password.as_deref(), Some("s3cret"));
                assert_eq!(cfg.failure_sample_cap, Some(3));
            }
            Command::Scenarios(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_run_defaults() {
        let parsed = Cli::try_parse_from(["vuload", "run"]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert_eq!(args.scenario, DEFAULT_SCENARIO);
                assert_eq!(args.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
                assert_eq!(args.output, OutputFormat::HumanReadable);
                assert!(!args.insecure);
                assert_eq!(args.vus, None);
            }
            Command::Scenarios(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_scenarios() {
        let parsed = Cli::try_parse_from(["vuload", "scenarios", "-c", "load.yml"]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Scenarios(args) => assert_eq!(args.config, PathBuf::from("load.yml")),
            Command::Run(_) => panic!("expected scenarios command"),
        }
    }
}
