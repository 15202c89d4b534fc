//! Unified configuration layer.
//!
//! Every environment variable read goes through this module; callers use the
//! structured configs instead of `std::env::var`.
//!
//! - `loader`: env_or / env_optional / env_bool helpers, `.env` loading
//! - `schema`: StagingConfig, DockerConfig, ObservabilityConfig
//! - `env_keys`: key constants and aliases
//! - `file`: the YAML config file

pub mod env_keys;
pub mod file;
pub mod loader;
pub mod schema;

pub use file::{ConfigError, DockerSection, FileConfig, StagingSection};
pub use loader::{
    env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir, remove_env_var,
    set_env_var, ScopedEnvGuard,
};
pub use schema::{DockerConfig, MountMode, ObservabilityConfig, StagingConfig};
