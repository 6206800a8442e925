//! Directory-backed snapshot store.
//!
//! Each location is one file `snapshot-NNNNNN.bin` under the store root,
//! numbered from a per-store counter. An allocated location is an empty
//! file; a written one holds a bincode [`FileHeader`] naming the label type,
//! followed by the bincode encoding of the snapshot.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::graph::labels::Label;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph_error::GraphError;
use crate::storage::{Location, SnapshotStore};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    next: AtomicU64,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, GraphError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| storage_err(&root, e))?;
        Ok(Self {
            root,
            next: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, location: &Location) -> Result<PathBuf, GraphError> {
        let name = location.as_str();
        // Only names this store handed out are accepted.
        if !name.starts_with("snapshot-") || name.contains(['/', '\\']) {
            return Err(GraphError::MissingSnapshot(location.clone()));
        }
        Ok(self.root.join(name))
    }
}

fn storage_err(path: &Path, e: std::io::Error) -> GraphError {
    GraphError::Storage(format!("{}: {e}", path.display()))
}

/// Leads every written file so a read with the wrong label type is told
/// apart from a damaged file.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct FileHeader {
    label: String,
}

impl FileHeader {
    fn of<L: Label>() -> Self {
        Self {
            label: std::any::type_name::<L>().to_owned(),
        }
    }
}

/// A short file is corrupt, not unreadable.
fn decode_err(path: &Path, e: bincode::Error) -> GraphError {
    match *e {
        bincode::ErrorKind::Io(io) if io.kind() != ErrorKind::UnexpectedEof => storage_err(path, io),
        other => GraphError::Codec(format!("{}: {other}", path.display())),
    }
}

impl SnapshotStore for FileStore {
    fn allocate(&self) -> Result<Location, GraphError> {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let name = format!("snapshot-{n:06}.bin");
            let path = self.root.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Location::new(name)),
                // Left over from an earlier process; skip the number.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(storage_err(&path, e)),
            }
        }
    }

    fn write<L: Label>(
        &self,
        location: &Location,
        snapshot: GraphSnapshot<L>,
    ) -> Result<(), GraphError> {
        let path = self.path_of(location)?;
        let meta = fs::metadata(&path).map_err(|_| GraphError::MissingSnapshot(location.clone()))?;
        if meta.len() > 0 {
            return Err(GraphError::Storage(format!(
                "snapshot at `{location}` is immutable once written"
            )));
        }
        let file = File::create(&path).map_err(|e| storage_err(&path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &FileHeader::of::<L>())?;
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush().map_err(|e| storage_err(&path, e))?;
        log::debug!("wrote {} records to {}", snapshot.len(), path.display());
        Ok(())
    }

    fn read<L: Label>(&self, location: &Location) -> Result<Arc<GraphSnapshot<L>>, GraphError> {
        let path = self.path_of(location)?;
        let file = File::open(&path).map_err(|_| GraphError::MissingSnapshot(location.clone()))?;
        let len = file.metadata().map_err(|e| storage_err(&path, e))?.len();
        if len == 0 {
            return Err(GraphError::EmptySnapshot(location.clone()));
        }
        let mut reader = BufReader::new(file);
        let header: FileHeader =
            bincode::deserialize_from(&mut reader).map_err(|e| decode_err(&path, e))?;
        if header != FileHeader::of::<L>() {
            log::debug!("{} holds `{}` labels", path.display(), header.label);
            return Err(GraphError::SnapshotTypeMismatch(location.clone()));
        }
        let snapshot: GraphSnapshot<L> =
            bincode::deserialize_from(&mut reader).map_err(|e| decode_err(&path, e))?;
        Ok(Arc::new(snapshot))
    }

    fn delete(&self, location: &Location) -> Result<(), GraphError> {
        let path = self.path_of(location)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GraphError::MissingSnapshot(location.clone()),
            _ => storage_err(&path, e),
        })
    }

    fn exists(&self, location: &Location) -> bool {
        self.path_of(location).is_ok_and(|p| p.is_file())
    }
}
