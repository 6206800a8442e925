//! Vertex-to-partition assignment and partition quality metrics.
//!
//! Snapshots are split into a fixed number of partitions by hashing the vertex
//! id with a fixed-seed `ahash` state, so the same id lands in the same
//! partition in every round and every run.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::graph::labels::Label;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;

pub type PartitionId = usize;

// Fixed seeds: partition assignment must not depend on process state.
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Deterministic hash partitioner over `n_parts` partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPartitioner {
    n_parts: usize,
}

impl HashPartitioner {
    /// Creates a partitioner; `n_parts` is clamped to at least one.
    pub fn new(n_parts: usize) -> Self {
        Self {
            n_parts: n_parts.max(1),
        }
    }

    pub fn n_parts(&self) -> usize {
        self.n_parts
    }

    /// Partition that owns `id`.
    pub fn part_of(&self, id: &VertexId) -> PartitionId {
        if self.n_parts == 1 {
            return 0;
        }
        let state = RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]);
        let mut hasher = state.build_hasher();
        id.as_str().hash(&mut hasher);
        (hasher.finish() % self.n_parts as u64) as PartitionId
    }
}

impl Default for HashPartitioner {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Balance and cut statistics of a partitioned snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionStats {
    /// Number of records held by each partition.
    pub records: Vec<usize>,
    /// Number of directed edges whose endpoints live in different partitions.
    pub edge_cut: usize,
    /// Total number of directed edges.
    pub edges: usize,
}

impl PartitionStats {
    /// Largest partition divided by the mean partition size (1.0 is perfect).
    pub fn imbalance(&self) -> f64 {
        let total: usize = self.records.iter().sum();
        if total == 0 || self.records.is_empty() {
            return 1.0;
        }
        let mean = total as f64 / self.records.len() as f64;
        let max = self.records.iter().copied().max().unwrap_or(0) as f64;
        max / mean
    }
}

/// Computes the edge cut of a snapshot under its own partitioner (O(E)).
pub fn edge_cut<L: Label>(snapshot: &GraphSnapshot<L>) -> usize {
    let p = snapshot.partitioner();
    snapshot
        .records()
        .map(|r| {
            let home = p.part_of(&r.id);
            r.out_neighbors().filter(|n| p.part_of(n) != home).count()
        })
        .sum()
}

/// Collects [`PartitionStats`] for a snapshot.
pub fn partition_stats<L: Label>(snapshot: &GraphSnapshot<L>) -> PartitionStats {
    PartitionStats {
        records: (0..snapshot.num_partitions())
            .map(|i| snapshot.partition(i).len())
            .collect(),
        edge_cut: edge_cut(snapshot),
        edges: snapshot.records().map(|r| r.out_degree()).sum(),
    }
}
