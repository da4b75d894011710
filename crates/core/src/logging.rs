//! Logging bootstrap for the AptWise binaries.
//!
//! Logs go to stderr so that stdout stays reserved for command output
//! (search hits, JSON reports).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Default filter when neither a level override nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber with stderr output.
///
/// `log_level` accepts anything `EnvFilter` understands, e.g. `"debug"` or
/// `"aptwise_knowledge=trace,info"`. Falls back to `RUST_LOG`, then `info`.
///
/// # Example
/// ```no_run
/// use aptwise_core::logging::init_logging;
///
/// init_logging(Some("debug"), true).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let env_level = std::env::var("RUST_LOG").ok();
    let filter_str = resolve_filter(log_level, env_level.as_deref());

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", filter_str, e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Pick the effective filter string: explicit override, then environment, then default.
fn resolve_filter<'a>(log_level: Option<&'a str>, env_level: Option<&'a str>) -> &'a str {
    log_level
        .filter(|l| !l.trim().is_empty())
        .or(env_level.filter(|l| !l.trim().is_empty()))
        .unwrap_or(DEFAULT_FILTER)
}
