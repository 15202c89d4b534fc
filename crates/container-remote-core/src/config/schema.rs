//! Configuration structs grouped by concern, loaded from the environment.

use super::env_keys::{docker as docker_keys, observability as obv_keys, staging as staging_keys};
use super::loader::{env_bool, env_optional, env_or};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// How a source reaches the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Copy into the staging area and bind the copy (the container cannot
    /// touch the original).
    #[default]
    Copy,
    /// Bind the source directly; the staging area stays empty.
    Direct,
}

impl FromStr for MountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "direct" | "bind" => Ok(Self::Direct),
            other => Err(format!("unknown mount mode '{}' (expected copy|direct)", other)),
        }
    }
}

/// Staging area placement
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub tmp_root: PathBuf,
    pub mount_mode: MountMode,
    pub keep_staging: bool,
    /// Sources outside this directory are rejected
    pub mount_boundary: Option<PathBuf>,
}

impl StagingConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let tmp_root = env_optional(
            staging_keys::CONTAINER_REMOTE_TMP_ROOT,
            staging_keys::TMP_ROOT_ALIASES,
        )
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

        let mount_mode = env_optional(
            staging_keys::CONTAINER_REMOTE_MOUNT_MODE,
            staging_keys::MOUNT_MODE_ALIASES,
        )
        .and_then(|s| match s.parse::<MountMode>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!("{}, using copy", e);
                None
            }
        })
        .unwrap_or_default();

        let keep_staging = env_bool(
            staging_keys::CONTAINER_REMOTE_KEEP_STAGING,
            staging_keys::KEEP_STAGING_ALIASES,
            false,
        );
        let mount_boundary =
            env_optional(staging_keys::CONTAINER_REMOTE_MOUNT_BOUNDARY, &[]).map(PathBuf::from);

        Self {
            tmp_root,
            mount_mode,
            keep_staging,
            mount_boundary,
        }
    }
}

/// Container runtime CLI
#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub docker_bin: String,
}

impl DockerConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            docker_bin: env_or(
                docker_keys::CONTAINER_REMOTE_DOCKER_BIN,
                docker_keys::DOCKER_BIN_ALIASES,
                || "docker".to_string(),
            ),
        }
    }
}

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    /// Read once per process; later calls return the cached value.
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::CONTAINER_REMOTE_QUIET, obv_keys::QUIET_ALIASES, false),
                log_level: env_or(
                    obv_keys::CONTAINER_REMOTE_LOG_LEVEL,
                    obv_keys::LOG_LEVEL_ALIASES,
                    || "container_remote=info".to_string(),
                ),
                log_json: env_bool(
                    obv_keys::CONTAINER_REMOTE_LOG_JSON,
                    obv_keys::LOG_JSON_ALIASES,
                    false,
                ),
                audit_log: env_optional(
                    obv_keys::CONTAINER_REMOTE_AUDIT_LOG,
                    obv_keys::AUDIT_LOG_ALIASES,
                ),
            }
        })
    }
}
