//! Environment variable keys and their aliases.
//!
//! Primary names use the `CONTAINER_REMOTE_*` prefix; the short `CR_*` forms
//! are accepted as aliases.

/// Staging area placement and behaviour
pub mod staging {
    /// Parent directory for staging roots (default: system temp dir)
    pub const CONTAINER_REMOTE_TMP_ROOT: &str = "CONTAINER_REMOTE_TMP_ROOT";
    pub const TMP_ROOT_ALIASES: &[&str] = &["CR_TMP_ROOT"];

    /// "copy" (default) or "direct"
    pub const CONTAINER_REMOTE_MOUNT_MODE: &str = "CONTAINER_REMOTE_MOUNT_MODE";
    pub const MOUNT_MODE_ALIASES: &[&str] = &["CR_MOUNT_MODE"];

    /// Keep the staging directory after teardown (debugging)
    pub const CONTAINER_REMOTE_KEEP_STAGING: &str = "CONTAINER_REMOTE_KEEP_STAGING";
    pub const KEEP_STAGING_ALIASES: &[&str] = &["CR_KEEP_STAGING"];

    /// Sources must resolve under this directory when set
    pub const CONTAINER_REMOTE_MOUNT_BOUNDARY: &str = "CONTAINER_REMOTE_MOUNT_BOUNDARY";
}

/// Container runtime transport
pub mod docker {
    /// Path or name of the docker-compatible CLI (docker, podman, nerdctl)
    pub const CONTAINER_REMOTE_DOCKER_BIN: &str = "CONTAINER_REMOTE_DOCKER_BIN";
    pub const DOCKER_BIN_ALIASES: &[&str] = &["CR_DOCKER_BIN"];
}

/// Logging and audit
pub mod observability {
    pub const CONTAINER_REMOTE_QUIET: &str = "CONTAINER_REMOTE_QUIET";
    pub const QUIET_ALIASES: &[&str] = &["CR_QUIET"];

    pub const CONTAINER_REMOTE_LOG_LEVEL: &str = "CONTAINER_REMOTE_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["CR_LOG_LEVEL"];

    pub const CONTAINER_REMOTE_LOG_JSON: &str = "CONTAINER_REMOTE_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &["CR_LOG_JSON"];

    pub const CONTAINER_REMOTE_AUDIT_LOG: &str = "CONTAINER_REMOTE_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &["CR_AUDIT_LOG"];
}
