//! Addressable snapshot storage.
//!
//! The driver never touches storage media directly: it allocates, writes,
//! reads and deletes snapshots through [`SnapshotStore`]. Two backends are
//! provided:
//!
//! - [`MemoryStore`]: `Arc`ed snapshots in a concurrent map, for tests and
//!   single-process runs.
//! - [`FileStore`]: one bincode file per location inside a directory.
//!
//! Locations are opaque to the core; only the store that produced a location
//! can interpret it.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::labels::Label;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph_error::GraphError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Opaque address of one snapshot inside a [`SnapshotStore`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(raw: impl Into<String>) -> Self {
        Location(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Location").field(&self.0).finish()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable, addressable storage for immutable snapshots.
///
/// # Lifecycle
/// `allocate` reserves a fresh location, which `exists` from then on. A
/// location is written exactly once; writing it again is an error. `delete`
/// releases it; afterwards `exists` is `false` and reads fail with
/// [`GraphError::MissingSnapshot`].
pub trait SnapshotStore: Send + Sync {
    /// Reserves a new, empty location.
    fn allocate(&self) -> Result<Location, GraphError>;

    /// Stores `snapshot` under a previously allocated, still empty location.
    fn write<L: Label>(&self, location: &Location, snapshot: GraphSnapshot<L>)
    -> Result<(), GraphError>;

    /// Loads the snapshot stored under `location`.
    fn read<L: Label>(&self, location: &Location) -> Result<Arc<GraphSnapshot<L>>, GraphError>;

    /// Releases `location` and whatever it holds.
    fn delete(&self, location: &Location) -> Result<(), GraphError>;

    fn exists(&self, location: &Location) -> bool;

    /// Allocates a location and writes `snapshot` to it in one step.
    fn put<L: Label>(&self, snapshot: GraphSnapshot<L>) -> Result<Location, GraphError> {
        let location = self.allocate()?;
        if let Err(e) = self.write(&location, snapshot) {
            if let Err(cleanup) = self.delete(&location) {
                log::warn!("could not release `{location}` after a failed write: {cleanup}");
            }
            return Err(e);
        }
        Ok(location)
    }
}
