//! Path concentration: reduce a set of sources to the minimal set of mount
//! roots such that nothing is mounted twice.
//!
//! `/a/b`, `/a/b/c` and `/a/d` concentrate to `/a/b` and `/a/d`: mounting both
//! `/a/b` and `/a/b/c` would shadow the nested copy inside the container.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use container_remote_core::path_validation::{canonicalize_source, validate_mount_root};

use crate::error::Result;

/// Collapse `.` and `..` without touching the filesystem. `..` never climbs
/// above the root.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Pure concentration over already-absolute paths.
///
/// `PathBuf` orders by component sequence, so once sorted every descendant
/// directly follows its ancestor (`/a/b` < `/a/b/c` < `/a/b2`) and a single
/// pass against the last accepted root is enough.
pub fn concentrate<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let sorted: BTreeSet<PathBuf> = paths
        .into_iter()
        .map(|p| normalize_lexical(p.as_ref()))
        .collect();

    let mut roots: Vec<PathBuf> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        match roots.last() {
            Some(root) if candidate.starts_with(root) => {}
            _ => roots.push(candidate),
        }
    }
    roots
}

/// Canonicalize real sources on disk, concentrate them and validate each
/// resulting root (not the filesystem root, inside `boundary` if given).
pub fn concentrate_sources<I, P>(paths: I, boundary: Option<&Path>) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut canonical = Vec::new();
    for path in paths {
        canonical.push(canonicalize_source(path.as_ref())?);
    }
    let roots = concentrate(canonical);
    for root in &roots {
        validate_mount_root(root, boundary)?;
    }
    Ok(roots)
}

/// Where a new source lands relative to the current roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Already a root.
    Existing(PathBuf),
    /// Strictly inside an existing root; nothing to stage.
    Covered(PathBuf),
    /// Becomes a root, absorbing the listed (descendant) roots.
    NewRoot { replaces: Vec<PathBuf> },
}

/// Incrementally maintained concentration result.
#[derive(Debug, Clone, Default)]
pub struct Mounted {
    roots: BTreeSet<PathBuf>,
}

impl Mounted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The root that covers `path`, if any.
    pub fn covering_root(&self, path: &Path) -> Option<&Path> {
        self.roots().find(|root| path.starts_with(root))
    }

    pub fn placement(&self, path: &Path) -> Placement {
        if let Some(root) = self.covering_root(path) {
            if root == path {
                return Placement::Existing(root.to_path_buf());
            }
            return Placement::Covered(root.to_path_buf());
        }
        let replaces = self
            .roots
            .iter()
            .filter(|root| root.starts_with(path))
            .cloned()
            .collect();
        Placement::NewRoot { replaces }
    }

    /// Insert `path`; returns the roots it absorbed.
    pub fn insert(&mut self, path: PathBuf) -> Vec<PathBuf> {
        match self.placement(&path) {
            Placement::Existing(_) | Placement::Covered(_) => Vec::new(),
            Placement::NewRoot { replaces } => {
                for root in &replaces {
                    self.roots.remove(root);
                }
                self.roots.insert(path);
                replaces
            }
        }
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }
}
