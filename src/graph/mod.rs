//! Graph data model: vertex ids, labels, records and partitioned snapshots.
//!
//! - [`VertexId`]: string handle, ordered lexicographically
//! - [`VertexRecord`]: id, weighted in/out adjacency and a typed label
//! - [`GraphSnapshot`]: the immutable, partitioned record set of one round
//! - [`GraphBuilder`]: assembles raw input graphs carrying [`LabelMap`] labels

pub mod builder;
pub mod labels;
pub mod record;
pub mod snapshot;
pub mod vertex_id;

pub use builder::GraphBuilder;
pub use labels::{Label, LabelMap, TypedValue};
pub use record::{EdgeSet, VertexRecord};
pub use snapshot::{GraphSnapshot, Partition};
pub use vertex_id::VertexId;
