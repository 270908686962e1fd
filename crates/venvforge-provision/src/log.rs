//! Quiet-mode aware logging. With VENVFORGE_QUIET=1, skip decisions and
//! step summaries are not logged at INFO.

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    venvforge_core::config::ObservabilityConfig::from_env().quiet
}
