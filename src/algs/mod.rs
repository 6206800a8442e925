//! The algorithm library.
//!
//! Every algorithm is a config struct implementing
//! [`Algorithm`](crate::engine::Algorithm) plus one label type, one message
//! type and helpers that read results out of the final snapshot.

pub mod betweenness;
pub mod bfs;
pub mod cliques;
pub mod hits;
pub mod kcore;
pub mod mst;
pub mod pagerank;
pub mod wcc;

pub use betweenness::{Betweenness, BetweennessConfig};
pub use bfs::{Bfs, BfsConfig};
pub use cliques::{CliqueConfig, MaximalCliques};
pub use hits::{Hits, HitsConfig};
pub use kcore::{KCore, KCoreConfig};
pub use mst::{Mst, MstConfig};
pub use pagerank::{PageRank, PageRankConfig};
pub use wcc::{Wcc, WccConfig};

use crate::graph::labels::LabelMap;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Fails with [`GraphError::UnknownSeed`] unless `id` is a vertex of `input`.
pub(crate) fn require_vertex(input: &GraphSnapshot<LabelMap>, id: &VertexId) -> Result<(), GraphError> {
    if input.contains(id) {
        Ok(())
    } else {
        Err(GraphError::UnknownSeed(id.clone()))
    }
}

pub(crate) fn require_round_bound(algorithm: &str, max_rounds: usize) -> Result<(), GraphError> {
    if max_rounds == 0 {
        return Err(GraphError::InvalidConfig(format!(
            "{algorithm}: max_rounds must be at least 1"
        )));
    }
    Ok(())
}
