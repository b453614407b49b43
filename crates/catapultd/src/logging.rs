//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Map a configured log level onto a tracing filter directive.
///
/// Accepts the config vocabulary (`debug`, `info`, `warning`, `error`,
/// `critical`); anything else falls back to `info`.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warning" | "warn" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init(log_level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
    }
}
