//! Tree copy used by the staging area.
//!
//! Symlinks are recreated as symlinks (never followed below the top level),
//! permissions are carried over, and special files are refused.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{MountError, Result};

pub(crate) fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let copy_err = |source: io::Error| MountError::CopyError {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    };

    let meta = fs::symlink_metadata(src).map_err(copy_err)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(src).map_err(copy_err)?;
        copy_symlink(&target, dest).map_err(copy_err)?;
    } else if file_type.is_dir() {
        fs::create_dir(dest).map_err(copy_err)?;
        for entry in fs::read_dir(src).map_err(copy_err)? {
            let entry = entry.map_err(copy_err)?;
            copy_tree(&entry.path(), &dest.join(entry.file_name()))?;
        }
        // Last, so a read-only directory does not block its own children.
        fs::set_permissions(dest, meta.permissions()).map_err(copy_err)?;
    } else if file_type.is_file() {
        fs::copy(src, dest).map_err(copy_err)?;
    } else {
        return Err(copy_err(io::Error::new(
            io::ErrorKind::Unsupported,
            "special file (fifo, socket or device) cannot be staged",
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    let _ = (target, dest);
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks can only be staged on unix hosts",
    ))
}

/// Remove a file, symlink or directory tree. Missing paths are fine.
pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let result = if meta.is_dir() {
        make_writable(path);
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Copied read-only directories would otherwise refuse `remove_dir_all`.
fn make_writable(dir: &Path) {
    let Ok(meta) = fs::symlink_metadata(dir) else {
        return;
    };
    if !meta.is_dir() {
        return;
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        let _ = fs::set_permissions(dir, perms);
    }
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            make_writable(&entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_preserves_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested/deeper")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("nested/deeper/leaf.txt"), "leaf").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("top.txt", src.join("link")).unwrap();

        let dest = tmp.path().join("dest");
        copy_tree(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(dest.join("nested/deeper/leaf.txt")).unwrap(),
            "leaf"
        );
        #[cfg(unix)]
        assert_eq!(fs::read_link(dest.join("link")).unwrap(), Path::new("top.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_refuses_sockets() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("s");
        fs::create_dir_all(&src).unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(src.join("sock")).unwrap();

        let err = copy_tree(&src, &tmp.path().join("d")).unwrap_err();
        match err {
            MountError::CopyError { from, source, .. } => {
                assert!(from.ends_with("sock"));
                assert_eq!(source.kind(), io::ErrorKind::Unsupported);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remove_path_handles_missing_and_readonly() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(remove_path(&tmp.path().join("missing")).is_ok());

        let dir = tmp.path().join("ro");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner/f"), "x").unwrap();
        let mut perms = fs::metadata(dir.join("inner")).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(dir.join("inner"), perms).unwrap();

        remove_path(&dir).unwrap();
        assert!(!dir.exists());
    }
}
