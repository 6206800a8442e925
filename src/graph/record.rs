//! `VertexRecord`: one vertex, its adjacency and its label.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::graph::vertex_id::VertexId;

/// Weighted adjacency keyed by neighbor id. Unweighted edges carry `1.0`.
pub type EdgeSet = BTreeMap<VertexId, f64>;

/// A vertex as stored in a snapshot.
///
/// `in_edges` is maintained by [`GraphBuilder`](crate::graph::GraphBuilder)
/// and only read by algorithms that need reverse adjacency (HITS, WCC).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord<L> {
    pub id: VertexId,
    pub out_edges: EdgeSet,
    pub in_edges: EdgeSet,
    pub label: L,
}

impl<L> VertexRecord<L> {
    /// Creates an isolated vertex.
    pub fn new(id: impl Into<VertexId>, label: L) -> Self {
        Self {
            id: id.into(),
            out_edges: EdgeSet::new(),
            in_edges: EdgeSet::new(),
            label,
        }
    }

    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }

    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }

    /// Out-neighbor ids in ascending order.
    pub fn out_neighbors(&self) -> impl Iterator<Item = &VertexId> {
        self.out_edges.keys()
    }

    /// In-neighbor ids in ascending order.
    pub fn in_neighbors(&self) -> impl Iterator<Item = &VertexId> {
        self.in_edges.keys()
    }

    /// Union of in- and out-neighbors, ascending and without duplicates.
    pub fn all_neighbors(&self) -> impl Iterator<Item = &VertexId> {
        itertools::merge(self.out_edges.keys(), self.in_edges.keys()).dedup()
    }

    /// Weight of the out-edge to `to`.
    pub fn weight_to(&self, to: &VertexId) -> Option<f64> {
        self.out_edges.get(to).copied()
    }

    /// Drops every edge (both directions) that touches `other`.
    ///
    /// Returns `true` when anything was removed.
    pub fn detach(&mut self, other: &VertexId) -> bool {
        let out = self.out_edges.remove(other).is_some();
        let inc = self.in_edges.remove(other).is_some();
        out || inc
    }

    /// Replaces the label, keeping id and adjacency.
    pub fn with_label<M>(self, label: M) -> VertexRecord<M> {
        VertexRecord {
            id: self.id,
            out_edges: self.out_edges,
            in_edges: self.in_edges,
            label,
        }
    }

    /// Like [`with_label`](Self::with_label) but borrows `self`.
    pub fn relabel<M>(&self, label: M) -> VertexRecord<M> {
        VertexRecord {
            id: self.id.clone(),
            out_edges: self.out_edges.clone(),
            in_edges: self.in_edges.clone(),
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> VertexRecord<()> {
        let mut r = VertexRecord::new("b", ());
        r.out_edges.insert("c".into(), 2.0);
        r.out_edges.insert("a".into(), 1.0);
        r.in_edges.insert("a".into(), 1.0);
        r.in_edges.insert("d".into(), 1.0);
        r
    }

    #[test]
    fn neighbors_are_merged_and_deduped() {
        let r = rec();
        let all: Vec<_> = r.all_neighbors().map(VertexId::as_str).collect();
        assert_eq!(all, vec!["a", "c", "d"]);
        assert_eq!(r.out_degree(), 2);
        assert_eq!(r.weight_to(&"c".into()), Some(2.0));
    }

    #[test]
    fn detach_removes_both_directions() {
        let mut r = rec();
        assert!(r.detach(&"a".into()));
        assert!(!r.detach(&"a".into()));
        assert_eq!(r.out_degree(), 1);
        assert_eq!(r.in_degree(), 1);
    }
}
