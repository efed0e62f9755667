//! Tracing subscriber setup for processes embedding the engine.

use crate::config::LoggingConfig;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Filter used when `RUST_LOG` is unset: warnings from dependencies, `level` from this crate.
#[must_use]
pub fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("warn,qos_core={level},tests={level}"))
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG=debug` and `RUST_LOG=trace` are shorthands scoped to this crate; any other
/// `RUST_LOG` value is used as a full filter directive. Without `RUST_LOG`, `config.level`
/// applies. `config.format` selects `json` output; anything else is pretty-printed.
///
/// # Errors
///
/// Returns [`TryInitError`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directive) if directive == "debug" || directive == "trace" => default_filter(&directive),
        Ok(_) => EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| default_filter(&config.level)),
        Err(_) => default_filter(&config.level),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).try_init()
    }
}
