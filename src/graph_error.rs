//! GraphError: unified error type for graph-rounds public APIs
//!
//! Every fallible operation in the engine, the storage layer, the substrates
//! and the algorithm library returns this type. [`GraphError::kind`] sorts a
//! value into the four classes the driver distinguishes.

use thiserror::Error;

use crate::graph::vertex_id::VertexId;
use crate::storage::Location;

/// Coarse classification of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before the first round; never retried.
    Configuration,
    /// A transform/merge, the substrate, storage or the aggregation service failed.
    RoundExecution,
    /// The round bound was exhausted; the last snapshot is still usable.
    NonConvergence,
    /// The run was cancelled from outside.
    Cancelled,
}

/// Unified error type for graph-rounds operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A configuration value is out of range or contradicts another one.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A seed/source vertex named in the configuration is not in the graph.
    #[error("seed vertex `{0}` is not present in the input graph")]
    UnknownSeed(VertexId),
    /// The algorithm needs every edge mirrored (u→v and v→u with equal weight).
    #[error("algorithm `{algorithm}` needs an undirected graph; edge `{from}` -> `{to}` has no matching reverse edge")]
    NotUndirected {
        algorithm: &'static str,
        from: VertexId,
        to: VertexId,
    },
    /// The given snapshot location was never allocated or was already deleted.
    #[error("snapshot location `{0}` does not exist")]
    MissingSnapshot(Location),
    /// A location holds a snapshot, but not of the requested label type.
    #[error("snapshot at `{0}` holds a different label type")]
    SnapshotTypeMismatch(Location),
    /// The location was allocated but no snapshot was written to it yet.
    #[error("snapshot location `{0}` is allocated but empty")]
    EmptySnapshot(Location),
    /// A storage backend operation failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// A message batch or a stored snapshot could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Codec(String),
    /// An `emit` or `merge` invocation failed for one vertex.
    #[error("vertex `{vertex}` failed during {phase}: {message}")]
    VertexFailure {
        vertex: VertexId,
        phase: &'static str,
        message: String,
    },
    /// A program broke the round contract (e.g. emitted an update under another id).
    #[error("round contract violated: {0}")]
    Contract(String),
    /// The aggregation service could not be reached.
    #[error("aggregation service unavailable: {0}")]
    AggregationUnavailable(String),
    /// Terminal failure of one round; the prior snapshot is left intact.
    #[error("round {round} failed: {source}")]
    RoundFailed {
        round: usize,
        last_snapshot: Location,
        #[source]
        source: Box<GraphError>,
    },
    /// The round bound was reached while the algorithm still wanted to iterate.
    #[error("did not converge within {max_rounds} rounds (last snapshot at `{last_snapshot}`)")]
    NotConverged {
        max_rounds: usize,
        last_snapshot: Location,
    },
    /// The cancellation token fired; in-flight messages were discarded.
    #[error("run cancelled")]
    Cancelled { last_snapshot: Option<Location> },
}

impl GraphError {
    /// Shorthand for a vertex-level failure inside `emit`.
    pub fn emit_failure(vertex: &VertexId, message: impl Into<String>) -> Self {
        GraphError::VertexFailure {
            vertex: vertex.clone(),
            phase: "emit",
            message: message.into(),
        }
    }

    /// Shorthand for a vertex-level failure inside `merge`.
    pub fn merge_failure(vertex: &VertexId, message: impl Into<String>) -> Self {
        GraphError::VertexFailure {
            vertex: vertex.clone(),
            phase: "merge",
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::InvalidConfig(_)
            | GraphError::UnknownSeed(_)
            | GraphError::NotUndirected { .. }
            | GraphError::MissingSnapshot(_) => ErrorKind::Configuration,
            GraphError::NotConverged { .. } => ErrorKind::NonConvergence,
            GraphError::Cancelled { .. } => ErrorKind::Cancelled,
            GraphError::RoundFailed { source, .. } => match source.kind() {
                ErrorKind::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::RoundExecution,
            },
            GraphError::SnapshotTypeMismatch(_)
            | GraphError::EmptySnapshot(_)
            | GraphError::Storage(_)
            | GraphError::Codec(_)
            | GraphError::VertexFailure { .. }
            | GraphError::Contract(_)
            | GraphError::AggregationUnavailable(_) => ErrorKind::RoundExecution,
        }
    }

    /// Location of the newest snapshot that is still valid, when the error carries one.
    pub fn last_snapshot(&self) -> Option<&Location> {
        match self {
            GraphError::RoundFailed { last_snapshot, .. }
            | GraphError::NotConverged { last_snapshot, .. } => Some(last_snapshot),
            GraphError::Cancelled { last_snapshot } => last_snapshot.as_ref(),
            _ => None,
        }
    }
}

impl From<bincode::Error> for GraphError {
    fn from(e: bincode::Error) -> Self {
        GraphError::Codec(e.to_string())
    }
}
