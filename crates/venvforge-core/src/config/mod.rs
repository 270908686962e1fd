//! venvforge configuration layer
//!
//! All environment variable reads live here; the rest of the workspace reads
//! typed config structs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or, env_optional, env_bool, load_dotenv
//! - `schema`: IndexConfig, PipelineConfig, ObservabilityConfig, StateConfig
//! - `env_keys`: key constants (with alias chains)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir};
pub use schema::{IndexConfig, ObservabilityConfig, PipelineConfig, StateConfig};
