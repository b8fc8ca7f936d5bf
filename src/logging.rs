//! Logging setup
//!
//! Logs go to stderr so they never mix with the alarm output on stdout.

use tracing_subscriber::EnvFilter;

/// Level used when nothing else is asked for
const DEFAULT_LEVEL: &str = "warn";

/// Map the CLI level names onto tracing's
fn normalize_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "verbose" | "debug" => "debug",
        "info" => "info",
        "warning" | "warn" => "warn",
        "error" | "critical" => "error",
        _ => DEFAULT_LEVEL,
    }
}

/// Pick the filter directive: `RUST_LOG` wins, then `--log-level`, then `--verbose`
fn directive(verbose: bool, log_level: Option<&str>) -> String {
    let level = match (log_level, verbose) {
        (Some(level), _) => normalize_level(level),
        (None, true) => "debug",
        (None, false) => DEFAULT_LEVEL,
    };
    format!("chimer={}", level)
}

pub fn init(verbose: bool, json: bool, log_level: Option<&str>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(verbose, log_level)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("{}", e))
}
