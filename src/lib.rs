#![cfg_attr(docsrs, feature(doc_cfg))]
//! # graph-rounds
//!
//! graph-rounds is a library of graph-analytics algorithms executed as
//! synchronous rounds over a partitioned graph snapshot: breadth-first
//! search, PageRank, HITS, single-source betweenness, minimum spanning forest
//! (GHS), weakly-connected components, k-core and maximal cliques.
//!
//! ## Features
//! - A vertex-centric round engine: `emit` per vertex, shuffle by destination,
//!   `merge` per vertex id
//! - Per-partition convergence signal and a task-id-deduplicated aggregation
//!   service for scalars that must reach every vertex before the next round
//! - An iteration driver owning snapshot lifecycle, round bounds and
//!   cancellation
//! - Pluggable substrates (serial, Rayon) and snapshot stores (memory, files)
//!
//! ## Determinism
//!
//! Every merge is independent of message order: floating sums are taken over
//! values sorted with `total_cmp`, choices are made by minimum over a
//! deterministic key, and the MST processes messages in `(sender, sequence)`
//! order. The serial substrate can shuffle message lists with a seeded
//! `SmallRng` to check this.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use graph_rounds::prelude::*;
//! use graph_rounds::algs::bfs;
//!
//! let graph = GraphBuilder::new()
//!     .undirected_edge("A", "B", 1.0)
//!     .undirected_edge("B", "C", 1.0)
//!     .build()?;
//! let store = Arc::new(MemoryStore::new());
//! let input = store.put(graph)?;
//! let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
//! let outcome = driver.run(&Bfs::new(BfsConfig::new("A")), &input)?;
//! let result = store.read::<bfs::BfsLabel>(&outcome.final_snapshot)?;
//! assert_eq!(bfs::distances(&result)["C"], 2);
//! # Ok::<(), GraphError>(())
//! ```

pub mod algs;
pub mod debug_invariants;
pub mod engine;
pub mod graph;
pub mod graph_error;
pub mod partitioning;
pub mod storage;
pub mod substrate;

pub use debug_invariants::DebugInvariants;
pub use graph_error::{ErrorKind, GraphError};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::{
        Betweenness, BetweennessConfig, Bfs, BfsConfig, CliqueConfig, Hits, HitsConfig, KCore,
        KCoreConfig, MaximalCliques, Mst, MstConfig, PageRank, PageRankConfig, Wcc, WccConfig,
    };
    pub use crate::engine::{
        AggregateTotals, AggregationService, Algorithm, CancellationToken, DriverConfig,
        Emission, IterationDriver, LocalAggregator, RoundReport, RunOutcome, TaskContext,
        Verdict, VertexProgram,
    };
    pub use crate::graph::{GraphBuilder, GraphSnapshot, LabelMap, TypedValue, VertexId, VertexRecord};
    pub use crate::graph_error::{ErrorKind, GraphError};
    pub use crate::storage::{FileStore, Location, MemoryStore, SnapshotStore};
    #[cfg(feature = "rayon")]
    pub use crate::substrate::RayonSubstrate;
    pub use crate::substrate::{SerialSubstrate, Substrate};
}

// Everything crossing a task boundary must be shareable.
static_assertions::assert_impl_all!(storage::MemoryStore: Send, Sync);
static_assertions::assert_impl_all!(storage::FileStore: Send, Sync);
static_assertions::assert_impl_all!(engine::LocalAggregator: Send, Sync);
static_assertions::assert_impl_all!(engine::ConvergenceSignal: Send, Sync);
static_assertions::assert_impl_all!(graph::GraphSnapshot<graph::LabelMap>: Send, Sync);
static_assertions::assert_impl_all!(GraphError: Send, Sync, std::error::Error);
