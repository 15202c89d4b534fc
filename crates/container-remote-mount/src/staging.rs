//! Staging area: a uniquely named scratch directory holding copies of the
//! mount sources until they are bound into the container.
//!
//! The directory is created lazily on the first [`StagingArea::add`] (or an
//! explicit [`StagingArea::init_staging`]) and removed by
//! [`StagingArea::remove_staging`] or, failing that, on drop.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use container_remote_core::config::{MountMode, StagingConfig};
use container_remote_core::path_validation::{canonicalize_source, validate_mount_root};
use serde::Serialize;
use uuid::Uuid;

use crate::concentrate::{Mounted, Placement};
use crate::copy::{copy_tree, remove_path};
use crate::error::{MountError, Result};

/// Attempts at finding a free directory name before giving up.
const MAX_INIT_ATTEMPTS: usize = 8;

type Remover = fn(&Path) -> io::Result<()>;

/// A source and where its content lives on the host side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedSource {
    /// Canonical source path.
    pub source: PathBuf,
    /// Copy inside the staging root, or `source` itself in direct mode.
    pub staged_path: PathBuf,
}

#[derive(Debug)]
pub struct StagingArea {
    name: String,
    parent: PathBuf,
    mode: MountMode,
    boundary: Option<PathBuf>,
    keep_on_drop: bool,
    root: Option<PathBuf>,
    mounted: Mounted,
    entries: Vec<StagedSource>,
    remover: Remover,
}

impl StagingArea {
    /// `name` becomes the directory prefix (`<parent>/<name>_<random>`).
    pub fn new(name: &str, parent: impl Into<PathBuf>) -> Self {
        Self {
            name: sanitize_name(name),
            parent: parent.into(),
            mode: MountMode::default(),
            boundary: None,
            keep_on_drop: false,
            root: None,
            mounted: Mounted::new(),
            entries: Vec::new(),
            remover: remove_path,
        }
    }

    pub fn from_config(name: &str, config: &StagingConfig) -> Self {
        Self::new(name, config.tmp_root.clone())
            .with_mode(config.mount_mode)
            .with_boundary(config.mount_boundary.clone())
            .keep_on_drop(config.keep_staging)
    }

    pub fn with_mode(mut self, mode: MountMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_boundary(mut self, boundary: Option<PathBuf>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn keep_on_drop(mut self, keep: bool) -> Self {
        self.keep_on_drop = keep;
        self
    }

    /// Leave the directory in place when this value is dropped.
    pub fn keep(&mut self) {
        self.keep_on_drop = true;
    }

    /// Route staging-root removal through `remover`.
    #[cfg(any(test, feature = "testing"))]
    pub fn set_remover(&mut self, remover: fn(&Path) -> io::Result<()>) {
        self.remover = remover;
    }

    /// `None` until initialised. Still reports the old path after removal.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn entries(&self) -> &[StagedSource] {
        &self.entries
    }

    /// Create the staging directory. Creation uses `create_dir` so two
    /// processes can never end up sharing a root. No-op when already created.
    pub fn init_staging(&mut self) -> Result<PathBuf> {
        if let Some(root) = self.root.as_ref().filter(|r| r.is_dir()) {
            return Ok(root.clone());
        }

        let parent = self.parent.clone();
        let init_err = |source: io::Error| MountError::StagingInitError {
            parent: parent.clone(),
            source,
        };
        fs::create_dir_all(&parent).map_err(init_err)?;

        for _ in 0..MAX_INIT_ATTEMPTS {
            let candidate = parent.join(unique_dir_name(&self.name));
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    tracing::info!(root = %candidate.display(), "Staging directory created");
                    self.root = Some(candidate.clone());
                    self.entries.clear();
                    self.mounted.clear();
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(root = %candidate.display(), "Staging name taken, retrying");
                }
                Err(e) => return Err(init_err(e)),
            }
        }
        Err(init_err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free staging directory name",
        )))
    }

    /// Stage `source`. Returns the entry that now covers it.
    ///
    /// Adding a path already covered by a staged ancestor stages nothing;
    /// adding an ancestor of staged sources replaces them; adding the same
    /// source again re-syncs its copy.
    pub fn add(&mut self, source: impl AsRef<Path>) -> Result<StagedSource> {
        let source = source.as_ref();
        let canonical = canonicalize_source(source)?;
        validate_mount_root(&canonical, self.boundary.as_deref())?;
        let root = self.init_staging()?;

        let resolved_root = root.canonicalize().unwrap_or_else(|_| root.clone());
        if self.mode == MountMode::Copy && resolved_root.starts_with(&canonical) {
            return Err(MountError::invalid(
                &canonical,
                format!("contains the staging directory {}", root.display()),
            ));
        }

        let replaces = match self.mounted.placement(&canonical) {
            Placement::Covered(covering) => {
                tracing::debug!(
                    source = %canonical.display(),
                    root = %covering.display(),
                    "Source already covered by staged ancestor"
                );
                return self.entry_for(&covering);
            }
            Placement::Existing(_) => Vec::new(),
            Placement::NewRoot { replaces } => replaces,
        };

        let staged_path = match self.mode {
            MountMode::Copy => self.copy_in(&root, &canonical, &replaces)?,
            MountMode::Direct => canonical.clone(),
        };

        self.entries.retain(|e| e.source != canonical && !replaces.contains(&e.source));
        self.mounted.insert(canonical.clone());
        let entry = StagedSource {
            source: canonical,
            staged_path,
        };
        self.entries.push(entry.clone());
        tracing::info!(
            source = %source.display(),
            staged = %entry.staged_path.display(),
            "Add source to staging"
        );
        Ok(entry)
    }

    /// Copy into a hidden sibling first so a failed copy never replaces good
    /// content; only a complete copy is renamed into place.
    fn copy_in(&self, root: &Path, canonical: &Path, replaces: &[PathBuf]) -> Result<PathBuf> {
        let basename = canonical
            .file_name()
            .ok_or_else(|| MountError::invalid(canonical, "path has no final component"))?;
        let dest = root.join(basename);

        if let Some(existing) = self.entries.iter().find(|e| {
            e.staged_path == dest && e.source != canonical && !replaces.contains(&e.source)
        }) {
            return Err(MountError::MountPathCollision {
                target: dest,
                existing: existing.source.clone(),
                incoming: canonical.to_path_buf(),
            });
        }

        let partial = hidden_sibling(&dest, "partial");
        if let Err(e) = copy_tree(canonical, &partial) {
            discard_partial(&partial);
            return Err(e);
        }

        swap_into_place(&partial, &dest, |from, to| fs::rename(from, to))?;

        // A replaced entry sharing the basename was already swapped out above.
        for replaced in self
            .entries
            .iter()
            .filter(|e| replaces.contains(&e.source) && e.staged_path != dest)
        {
            if let Err(e) = remove_path(&replaced.staged_path) {
                tracing::warn!(
                    path = %replaced.staged_path.display(),
                    error = %e,
                    "Failed to remove absorbed copy"
                );
            }
        }
        Ok(dest)
    }

    fn entry_for(&self, source: &Path) -> Result<StagedSource> {
        self.entries
            .iter()
            .find(|e| e.source == source)
            .cloned()
            .ok_or_else(|| MountError::SourceNotFound(source.to_path_buf()))
    }

    /// Delete the staging directory. Safe to call repeatedly; a directory that
    /// is already gone counts as removed.
    pub fn remove_staging(&mut self) -> Result<()> {
        let Some(root) = self.root.clone() else {
            tracing::debug!("Staging directory never created -> skip");
            return Ok(());
        };
        if !root.exists() {
            tracing::info!(root = %root.display(), "Staging directory not found -> skip");
        } else {
            tracing::info!(root = %root.display(), "Staging directory found -> remove");
            (self.remover)(&root).map_err(|source| MountError::CleanupError {
                path: root.clone(),
                source,
            })?;
        }
        self.entries.clear();
        self.mounted.clear();
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.keep_on_drop {
            if let Some(root) = &self.root {
                tracing::info!(root = %root.display(), "Keeping staging directory");
            }
            return;
        }
        if let Err(e) = self.remove_staging() {
            tracing::warn!(error = %e, "Staging cleanup on drop failed");
        }
    }
}

/// Image references like `ghcr.io/org/tool:1.2` become `ghcr.io-org-tool`.
fn sanitize_name(name: &str) -> String {
    let base = name.split(':').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '-' || c == '.').to_string();
    if cleaned.is_empty() {
        "tmp".to_string()
    } else {
        cleaned
    }
}

/// Move the complete copy at `partial` to `dest`. Whatever `dest` held is
/// parked beside it and put back if the final rename fails; `partial` never
/// outlives an error.
fn swap_into_place<F>(partial: &Path, dest: &Path, rename: F) -> Result<()>
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    let parked = fs::symlink_metadata(dest)
        .is_ok()
        .then(|| hidden_sibling(dest, "previous"));

    if let Some(parked) = &parked {
        if let Err(source) = rename(dest, parked) {
            discard_partial(partial);
            return Err(MountError::CleanupError {
                path: dest.to_path_buf(),
                source,
            });
        }
    }

    if let Err(source) = rename(partial, dest) {
        if let Some(parked) = &parked {
            if let Err(e) = rename(parked, dest) {
                tracing::warn!(
                    path = %dest.display(),
                    parked = %parked.display(),
                    error = %e,
                    "Failed to restore previous copy"
                );
            }
        }
        discard_partial(partial);
        return Err(MountError::CopyError {
            from: partial.to_path_buf(),
            to: dest.to_path_buf(),
            source,
        });
    }

    if let Some(parked) = parked {
        if let Err(e) = remove_path(&parked) {
            tracing::warn!(path = %parked.display(), error = %e, "Failed to remove previous copy");
        }
    }
    Ok(())
}

fn discard_partial(partial: &Path) {
    if let Err(e) = remove_path(partial) {
        tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial copy");
    }
}

/// `<dir>/.<name>.<tag>-<id>`
fn hidden_sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}-{}", name, tag, short_id()))
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn unique_dir_name(name: &str) -> String {
    format!("{}_{}", name, short_id())
}
