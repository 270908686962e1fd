//! Config structs grouped by concern.
//!
//! Loaded from environment variables with a shared fallback policy.

use super::env_keys::{index, observability as obv_keys, pipeline, state};
use super::loader::{env_bool, env_optional, env_or};
use std::time::Duration;

/// Package index endpoint
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub base_url: String,
}

impl IndexConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let base_url = env_or(index::VENVFORGE_INDEX_URL, index::INDEX_URL_ALIASES, || {
            index::DEFAULT_INDEX_URL.to_string()
        });
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Pipeline switches: step timeout and the partial-skip optimization.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub step_timeout: Option<Duration>,
    pub partial_skip: bool,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let step_timeout = env_optional(pipeline::VENVFORGE_STEP_TIMEOUT_SECS, &[])
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self {
            step_timeout,
            partial_skip: env_bool(pipeline::VENVFORGE_PARTIAL_SKIP, &[], true),
        }
    }

    /// CLI flags win over the environment.
    pub fn with_cli_overrides(mut self, timeout_secs: Option<u64>, coarse: bool) -> Self {
        if let Some(secs) = timeout_secs {
            self.step_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if coarse {
            self.partial_skip = false;
        }
        self
    }
}

/// Name of the per-project state home (holds sandbox, sources and record).
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub dir_name: String,
}

impl StateConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            dir_name: env_or(state::VENVFORGE_STATE_DIR, &[], || {
                state::DEFAULT_STATE_DIR.to_string()
            }),
        }
    }
}

/// Observability: quiet, log_level, log_json
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::VENVFORGE_QUIET, &[], false),
                log_level: env_or(obv_keys::VENVFORGE_LOG_LEVEL, &[], || {
                    "venvforge=info".to_string()
                }),
                log_json: env_bool(obv_keys::VENVFORGE_LOG_JSON, &[], false),
            }
        })
    }
}
