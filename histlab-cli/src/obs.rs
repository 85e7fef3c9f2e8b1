//! Tracing subscriber setup for the CLI.

use anyhow::{bail, Context, Result};

/// Environment variable that overrides `--log-level`.
pub const LOG_ENV: &str = "HISTLAB_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays clean for
/// command output.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter =
        tracing_subscriber::EnvFilter::try_new(filter).context("invalid log filter")?;

    match log_format.trim().to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        other => bail!("unknown --log-format '{other}' (expected text or json)"),
    }
    Ok(())
}
