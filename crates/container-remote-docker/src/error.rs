use container_remote_mount::MountError;
use thiserror::Error;

use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("failed to launch container '{name}': {reason}")]
    ContainerLaunchError {
        name: String,
        reason: String,
        #[source]
        source: Option<RuntimeError>,
    },

    #[error("container '{name}' is not running (state: {state})")]
    ContainerNotRunning { name: String, state: String },

    #[error("working directory {path} unusable: {reason}")]
    InvalidWorkingDirectory { path: String, reason: String },

    #[error("container runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("teardown incomplete: {}", .0.join("; "))]
    TeardownIncomplete(Vec<String>),
}

impl RemoteError {
    pub(crate) fn launch(
        name: &str,
        reason: impl Into<String>,
        source: Option<RuntimeError>,
    ) -> Self {
        Self::ContainerLaunchError {
            name: name.to_string(),
            reason: reason.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
