//! In-process snapshot store.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::graph::labels::Label;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph_error::GraphError;
use crate::storage::{Location, SnapshotStore};

type Slot = Option<Arc<dyn Any + Send + Sync>>;

/// Keeps snapshots as type-erased `Arc`s in a [`DashMap`].
///
/// Reads are zero-copy: every reader shares the stored `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    slots: DashMap<Location, Slot>,
    next: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All currently existing locations, sorted.
    pub fn live_locations(&self) -> Vec<Location> {
        let mut out: Vec<_> = self.slots.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("live", &self.live_locations())
            .finish()
    }
}

impl SnapshotStore for MemoryStore {
    fn allocate(&self) -> Result<Location, GraphError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let location = Location::new(format!("mem://snapshot-{n:06}"));
        self.slots.insert(location.clone(), None);
        Ok(location)
    }

    fn write<L: Label>(
        &self,
        location: &Location,
        snapshot: GraphSnapshot<L>,
    ) -> Result<(), GraphError> {
        let mut slot = self
            .slots
            .get_mut(location)
            .ok_or_else(|| GraphError::MissingSnapshot(location.clone()))?;
        if slot.is_some() {
            return Err(GraphError::Storage(format!(
                "snapshot at `{location}` is immutable once written"
            )));
        }
        *slot = Some(Arc::new(snapshot));
        Ok(())
    }

    fn read<L: Label>(&self, location: &Location) -> Result<Arc<GraphSnapshot<L>>, GraphError> {
        let slot = self
            .slots
            .get(location)
            .ok_or_else(|| GraphError::MissingSnapshot(location.clone()))?;
        let any = slot
            .as_ref()
            .ok_or_else(|| GraphError::EmptySnapshot(location.clone()))?
            .clone();
        any.downcast::<GraphSnapshot<L>>()
            .map_err(|_| GraphError::SnapshotTypeMismatch(location.clone()))
    }

    fn delete(&self, location: &Location) -> Result<(), GraphError> {
        self.slots
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| GraphError::MissingSnapshot(location.clone()))
    }

    fn exists(&self, location: &Location) -> bool {
        self.slots.contains_key(location)
    }
}
