//! Mount table: source → staged path → container path.
//!
//! Every staged root lands at `<remote_root>/<basename>`. Two different roots
//! with the same basename are rejected with `MountPathCollision` rather than
//! renamed, so a path an agent is told about is always the path it gets.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use container_remote_core::path_validation::is_filesystem_root;

use crate::error::{MountError, Result};
use crate::staging::{StagedSource, StagingArea};

pub const DEFAULT_REMOTE_ROOT: &str = "/remote_root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub source: PathBuf,
    pub staged_path: PathBuf,
    pub container_path: PathBuf,
}

/// One `host:container[:ro]` bind for the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeBinding {
    pub host: PathBuf,
    pub container: PathBuf,
    pub read_only: bool,
}

impl fmt::Display for VolumeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container.display())?;
        if self.read_only {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MountTable {
    remote_root: PathBuf,
    read_only: bool,
    entries: Vec<MountEntry>,
}

impl Default for MountTable {
    fn default() -> Self {
        Self {
            remote_root: PathBuf::from(DEFAULT_REMOTE_ROOT),
            read_only: false,
            entries: Vec::new(),
        }
    }
}

impl MountTable {
    pub fn new(remote_root: impl Into<PathBuf>) -> Result<Self> {
        let remote_root = remote_root.into();
        if !remote_root.is_absolute() {
            return Err(MountError::invalid(remote_root, "remote root must be absolute"));
        }
        if is_filesystem_root(&remote_root) {
            return Err(MountError::invalid(
                remote_root,
                "remote root cannot be the container's /",
            ));
        }
        Ok(Self {
            remote_root,
            ..Self::default()
        })
    }

    /// Bind every entry of `staging` under `remote_root`.
    pub fn from_staging(remote_root: impl Into<PathBuf>, staging: &StagingArea) -> Result<Self> {
        let mut table = Self::new(remote_root)?;
        for staged in staging.entries() {
            table.bind(staged)?;
        }
        Ok(table)
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn remote_root(&self) -> &Path {
        &self.remote_root
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `staged`. Re-binding the same source replaces its entry.
    pub fn bind(&mut self, staged: &StagedSource) -> Result<&MountEntry> {
        let basename = staged
            .source
            .file_name()
            .ok_or_else(|| MountError::invalid(&staged.source, "path has no final component"))?;
        let container_path = self.remote_root.join(basename);

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.container_path == container_path && e.source != staged.source)
        {
            return Err(MountError::MountPathCollision {
                target: container_path,
                existing: existing.source.clone(),
                incoming: staged.source.clone(),
            });
        }

        self.entries.retain(|e| e.source != staged.source);
        self.entries.push(MountEntry {
            source: staged.source.clone(),
            staged_path: staged.staged_path.clone(),
            container_path,
        });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// The volume list handed to the runtime, in registration order.
    pub fn volumes(&self) -> Vec<VolumeBinding> {
        self.entries
            .iter()
            .map(|e| VolumeBinding {
                host: e.staged_path.clone(),
                container: e.container_path.clone(),
                read_only: self.read_only,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(source: &str, staged_path: &str) -> StagedSource {
        StagedSource {
            source: PathBuf::from(source),
            staged_path: PathBuf::from(staged_path),
        }
    }

    #[test]
    fn test_container_paths_use_basename() {
        let mut table = MountTable::new("/remote_root").unwrap();
        table.bind(&staged("/home/u/src", "/tmp/stage_1/src")).unwrap();
        table.bind(&staged("/data/notes.md", "/tmp/stage_1/notes.md")).unwrap();

        let targets: Vec<_> = table.entries().iter().map(|e| e.container_path.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/remote_root/src"),
                PathBuf::from("/remote_root/notes.md")
            ]
        );
        let volumes: Vec<String> = table.volumes().iter().map(ToString::to_string).collect();
        assert_eq!(
            volumes,
            vec![
                "/tmp/stage_1/src:/remote_root/src",
                "/tmp/stage_1/notes.md:/remote_root/notes.md"
            ]
        );
    }

    #[test]
    fn test_collision_is_rejected() {
        let mut table = MountTable::new("/r").unwrap();
        table.bind(&staged("/a/src", "/s/src")).unwrap();
        let err = table.bind(&staged("/b/src", "/b/src")).unwrap_err();
        match err {
            MountError::MountPathCollision { target, existing, incoming } => {
                assert_eq!(target, PathBuf::from("/r/src"));
                assert_eq!(existing, PathBuf::from("/a/src"));
                assert_eq!(incoming, PathBuf::from("/b/src"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(table.entries().len(), 1);
    }

    #[test]
    fn test_rebinding_same_source_replaces() {
        let mut table = MountTable::new("/r").unwrap();
        table.bind(&staged("/a/src", "/s1/src")).unwrap();
        table.bind(&staged("/a/src", "/s2/src")).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].staged_path, PathBuf::from("/s2/src"));
    }

    #[test]
    fn test_invalid_remote_roots() {
        assert!(matches!(
            MountTable::new("relative"),
            Err(MountError::InvalidMountPath { .. })
        ));
        assert!(matches!(
            MountTable::new("/"),
            Err(MountError::InvalidMountPath { .. })
        ));
    }

    #[test]
    fn test_read_only_volumes() {
        let mut table = MountTable::new("/r").unwrap().read_only(true);
        table.bind(&staged("/a/src", "/s/src")).unwrap();
        assert_eq!(table.volumes()[0].to_string(), "/s/src:/r/src:ro");
    }

    #[test]
    fn test_from_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("x.txt"), "x").unwrap();

        let mut staging = StagingArea::new("img", tmp.path().join("stage"));
        staging.add(&src).unwrap();
        let table = MountTable::from_staging(DEFAULT_REMOTE_ROOT, &staging).unwrap();

        let entry = &table.entries()[0];
        assert_eq!(entry.container_path, PathBuf::from("/remote_root/src"));
        assert!(entry.staged_path.join("x.txt").exists());
    }
}
