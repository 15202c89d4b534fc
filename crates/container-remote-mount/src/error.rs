use container_remote_core::path_validation::PathValidationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Staging and mount failures. All of them surface before a container is
/// launched.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("invalid mount path {path}: {reason}")]
    InvalidMountPath { path: PathBuf, reason: String },

    #[error("mount source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to copy {from} to {to}: {source}")]
    CopyError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create staging directory under {parent}: {source}")]
    StagingInitError {
        parent: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    CleanupError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("mount path collision at {target}: {existing} and {incoming} share a basename")]
    MountPathCollision {
        target: PathBuf,
        existing: PathBuf,
        incoming: PathBuf,
    },
}

impl MountError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidMountPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<PathValidationError> for MountError {
    fn from(e: PathValidationError) -> Self {
        match e {
            PathValidationError::NotFound(path) => Self::SourceNotFound(path),
            PathValidationError::Unreadable { ref path, .. } => {
                Self::invalid(path.clone(), e.to_string())
            }
            PathValidationError::FilesystemRoot(ref path) => {
                Self::invalid(path.clone(), "the filesystem root cannot be mounted")
            }
            PathValidationError::EscapesBoundary { ref path, .. } => {
                Self::invalid(path.clone(), e.to_string())
            }
            PathValidationError::InvalidBoundary { ref boundary, .. } => {
                Self::invalid(boundary.clone(), e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MountError>;
