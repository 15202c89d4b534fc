//! Path validation for mount sources.
//!
//! A source must exist, must not be the filesystem root, and must stay within
//! the configured mount boundary (when one is set).

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathValidationError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to mount the filesystem root: {0}")]
    FilesystemRoot(PathBuf),

    #[error("{path} escapes mount boundary {boundary}")]
    EscapesBoundary { path: PathBuf, boundary: PathBuf },

    #[error("invalid mount boundary {boundary}: {source}")]
    InvalidBoundary {
        boundary: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// True for `/` (and bare prefixes such as `C:\` on Windows).
pub fn is_filesystem_root(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
        && path.has_root()
}

/// Resolve `path` against the cwd and canonicalize it (symlinks followed).
pub fn canonicalize_source(path: &Path) -> Result<PathBuf, PathValidationError> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| PathValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };
    full.canonicalize().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PathValidationError::NotFound(path.to_path_buf())
        } else {
            PathValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Validate an already canonical path as a mount root.
pub fn validate_mount_root(
    canonical: &Path,
    boundary: Option<&Path>,
) -> Result<(), PathValidationError> {
    if is_filesystem_root(canonical) {
        return Err(PathValidationError::FilesystemRoot(canonical.to_path_buf()));
    }
    if let Some(boundary) = boundary {
        let boundary = boundary
            .canonicalize()
            .map_err(|source| PathValidationError::InvalidBoundary {
                boundary: boundary.to_path_buf(),
                source,
            })?;
        if !canonical.starts_with(&boundary) {
            return Err(PathValidationError::EscapesBoundary {
                path: canonical.to_path_buf(),
                boundary,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_filesystem_root_detection() {
        assert!(is_filesystem_root(Path::new("/")));
        assert!(!is_filesystem_root(Path::new("/tmp")));
        assert!(!is_filesystem_root(Path::new("relative")));
    }

    #[test]
    fn test_canonicalize_missing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            canonicalize_source(&missing),
            Err(PathValidationError::NotFound(p)) if p == missing
        ));
    }

    #[test]
    fn test_boundary_enforced() {
        let tmp = tempfile::tempdir().unwrap();
        let inside = tmp.path().join("inside");
        fs::create_dir_all(&inside).unwrap();
        let inside = canonicalize_source(&inside).unwrap();

        assert!(validate_mount_root(&inside, Some(tmp.path())).is_ok());
        assert!(validate_mount_root(&inside, None).is_ok());

        let other = tempfile::tempdir().unwrap();
        let err = validate_mount_root(&inside, Some(other.path())).unwrap_err();
        assert!(matches!(err, PathValidationError::EscapesBoundary { .. }));

        assert!(matches!(
            validate_mount_root(Path::new("/"), None),
            Err(PathValidationError::FilesystemRoot(_))
        ));
    }
}
