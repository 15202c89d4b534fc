//! Mount staging for container-remote.
//!
//! Sources are concentrated into non-overlapping roots, copied into a unique
//! staging directory, and bound under a remote root inside the container:
//!
//! ```no_run
//! use container_remote_mount::{MountTable, StagingArea, DEFAULT_REMOTE_ROOT};
//!
//! let mut staging = StagingArea::new("ubuntu", std::env::temp_dir());
//! staging.add("/tmp/src").unwrap();
//! let table = MountTable::from_staging(DEFAULT_REMOTE_ROOT, &staging).unwrap();
//! for volume in table.volumes() {
//!     println!("-v {}", volume);
//! }
//! ```

pub mod concentrate;
mod copy;
pub mod error;
pub mod staging;
pub mod table;

pub use concentrate::{concentrate, concentrate_sources, Mounted, Placement};
pub use error::{MountError, Result};
pub use staging::{StagedSource, StagingArea};
pub use table::{MountEntry, MountTable, VolumeBinding, DEFAULT_REMOTE_ROOT};
