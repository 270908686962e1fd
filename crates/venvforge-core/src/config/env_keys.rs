//! Environment variable keys and alias chains.
//!
//! Primary variables use the `VENVFORGE_*` prefix; a few well-known variables
//! from the Python ecosystem are accepted as aliases.

/// Package index
pub mod index {
    pub const VENVFORGE_INDEX_URL: &str = "VENVFORGE_INDEX_URL";
    pub const INDEX_URL_ALIASES: &[&str] = &["PYPI_MIRROR_URL"];

    pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";
}

/// Pipeline behavior
pub mod pipeline {
    /// Per-step timeout in seconds; `0` or unset disables it.
    pub const VENVFORGE_STEP_TIMEOUT_SECS: &str = "VENVFORGE_STEP_TIMEOUT_SECS";
    /// `0` falls back to "always redo everything after version resolution".
    pub const VENVFORGE_PARTIAL_SKIP: &str = "VENVFORGE_PARTIAL_SKIP";
}

/// Per-project state home
pub mod state {
    pub const VENVFORGE_STATE_DIR: &str = "VENVFORGE_STATE_DIR";

    pub const DEFAULT_STATE_DIR: &str = ".venvforge";
}

/// Observability and logging
pub mod observability {
    pub const VENVFORGE_QUIET: &str = "VENVFORGE_QUIET";
    pub const VENVFORGE_LOG_LEVEL: &str = "VENVFORGE_LOG_LEVEL";
    pub const VENVFORGE_LOG_JSON: &str = "VENVFORGE_LOG_JSON";
}
