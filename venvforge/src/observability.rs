//! Tracing initialization.
//!
//! Uses config::ObservabilityConfig for VENVFORGE_QUIET, VENVFORGE_LOG_LEVEL, VENVFORGE_LOG_JSON.

use tracing_subscriber::{prelude::*, EnvFilter};
use venvforge_core::config::ObservabilityConfig;

/// Initialize tracing. Call at process startup.
/// When VENVFORGE_QUIET=1 only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "venvforge=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // Logs go to stderr; stdout carries progress lines and child output.
    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}
