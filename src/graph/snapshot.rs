//! `GraphSnapshot`: the complete, immutable vertex-record set at a round boundary.
//!
//! A snapshot is split into partitions by a [`HashPartitioner`]; every record
//! lives in the partition its id hashes to. Substrates emit and merge one
//! partition per task, so the partition is also the unit of parallelism.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::graph::labels::Label;
use crate::graph::record::VertexRecord;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;
use crate::partitioning::{HashPartitioner, PartitionId};

/// One partition of a snapshot, keyed and ordered by vertex id.
pub type Partition<L> = BTreeMap<VertexId, VertexRecord<L>>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot<L> {
    partitioner: HashPartitioner,
    partitions: Vec<Partition<L>>,
}

impl<L: Label> GraphSnapshot<L> {
    /// Creates an empty snapshot with the partition layout of `partitioner`.
    pub fn new(partitioner: HashPartitioner) -> Self {
        Self {
            partitioner,
            partitions: (0..partitioner.n_parts()).map(|_| Partition::new()).collect(),
        }
    }

    /// Assembles a snapshot from already-partitioned records.
    ///
    /// Fails with [`GraphError::Contract`] when a record sits in the wrong
    /// partition or under a key that is not its own id.
    pub fn from_partitions(
        partitioner: HashPartitioner,
        partitions: Vec<Partition<L>>,
    ) -> Result<Self, GraphError> {
        if partitions.len() != partitioner.n_parts() {
            return Err(GraphError::Contract(format!(
                "expected {} partitions, got {}",
                partitioner.n_parts(),
                partitions.len()
            )));
        }
        let snapshot = Self {
            partitioner,
            partitions,
        };
        snapshot.validate_invariants()?;
        Ok(snapshot)
    }

    /// Builds a snapshot from loose records, routing each to its partition.
    pub fn from_records<I>(partitioner: HashPartitioner, records: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = VertexRecord<L>>,
    {
        let mut snapshot = Self::new(partitioner);
        for record in records {
            let id = record.id.clone();
            if snapshot.insert(record).is_some() {
                return Err(GraphError::InvalidConfig(format!("duplicate vertex id `{id}`")));
            }
        }
        Ok(snapshot)
    }

    /// Inserts (or replaces) a record, returning the replaced one.
    pub fn insert(&mut self, record: VertexRecord<L>) -> Option<VertexRecord<L>> {
        let part = self.partitioner.part_of(&record.id);
        self.partitions[part].insert(record.id.clone(), record)
    }

    pub fn partitioner(&self) -> HashPartitioner {
        self.partitioner
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, idx: PartitionId) -> &Partition<L> {
        &self.partitions[idx]
    }

    pub fn get(&self, id: &VertexId) -> Option<&VertexRecord<L>> {
        self.partitions[self.partitioner.part_of(id)].get(id)
    }

    /// Label of `id`, if the vertex exists.
    pub fn label(&self, id: &str) -> Option<&L> {
        self.get(&VertexId::from(id)).map(|r| &r.label)
    }

    pub fn contains(&self, id: &VertexId) -> bool {
        self.get(id).is_some()
    }

    /// Number of vertices across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(|p| p.is_empty())
    }

    /// Records in partition order, then id order within a partition.
    pub fn records(&self) -> impl Iterator<Item = &VertexRecord<L>> {
        self.partitions.iter().flat_map(|p| p.values())
    }

    /// Records sorted globally by id.
    pub fn sorted_records(&self) -> Vec<&VertexRecord<L>> {
        let mut all: Vec<_> = self.records().collect();
        all.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Splits the snapshot into its partitions.
    pub fn into_partitions(self) -> Vec<Partition<L>> {
        self.partitions
    }

    /// Converts every label with `f`, keeping ids, adjacency and partitioning.
    pub fn map_labels<M, F>(&self, mut f: F) -> Result<GraphSnapshot<M>, GraphError>
    where
        M: Label,
        F: FnMut(&VertexRecord<L>) -> Result<M, GraphError>,
    {
        let mut partitions = Vec::with_capacity(self.partitions.len());
        for part in &self.partitions {
            let mut out = Partition::new();
            for (id, record) in part {
                let label = f(record)?;
                out.insert(id.clone(), record.relabel(label));
            }
            partitions.push(out);
        }
        Ok(GraphSnapshot {
            partitioner: self.partitioner,
            partitions,
        })
    }

    /// First directed edge `u -> v` (in id order) whose reverse edge is
    /// missing or carries a different weight, or which is a self-loop.
    pub fn find_asymmetric_edge(&self) -> Option<(VertexId, VertexId)> {
        for record in self.sorted_records() {
            for (to, w) in &record.out_edges {
                if *to == record.id {
                    return Some((record.id.clone(), to.clone()));
                }
                let mirrored = self
                    .get(to)
                    .and_then(|other| other.weight_to(&record.id))
                    .is_some_and(|back| back == *w);
                if !mirrored {
                    return Some((record.id.clone(), to.clone()));
                }
            }
        }
        None
    }

    /// Fails with [`GraphError::NotUndirected`] unless every edge is mirrored
    /// with an equal weight and there are no self-loops.
    pub fn require_undirected(&self, algorithm: &'static str) -> Result<(), GraphError> {
        match self.find_asymmetric_edge() {
            None => Ok(()),
            Some((from, to)) => Err(GraphError::NotUndirected {
                algorithm,
                from,
                to,
            }),
        }
    }
}

impl<L: Label> DebugInvariants for GraphSnapshot<L> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GraphSnapshot");
    }

    fn validate_invariants(&self) -> Result<(), GraphError> {
        for (idx, part) in self.partitions.iter().enumerate() {
            for (key, record) in part {
                if *key != record.id {
                    return Err(GraphError::Contract(format!(
                        "record `{}` stored under key `{key}`",
                        record.id
                    )));
                }
                let home = self.partitioner.part_of(key);
                if home != idx {
                    return Err(GraphError::Contract(format!(
                        "record `{key}` stored in partition {idx}, belongs to {home}"
                    )));
                }
                if let Some((to, w)) = record
                    .out_edges
                    .iter()
                    .chain(record.in_edges.iter())
                    .find(|(_, w)| !w.is_finite())
                {
                    return Err(GraphError::Contract(format!(
                        "edge `{key}` -- `{to}` has non-finite weight {w}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    #[test]
    fn records_land_in_their_partition() {
        let g = GraphBuilder::new()
            .partitions(4)
            .edge("a", "b")
            .edge("b", "c")
            .edge("c", "d")
            .build()
            .unwrap();
        assert_eq!(g.len(), 4);
        assert!(g.validate_invariants().is_ok());
        for r in g.records() {
            assert!(g.contains(&r.id));
        }
    }

    #[test]
    fn from_partitions_rejects_misplaced_record() {
        let p = HashPartitioner::new(2);
        let id = VertexId::from("x");
        let wrong = 1 - p.part_of(&id);
        let mut parts = vec![Partition::new(), Partition::new()];
        parts[wrong].insert(id.clone(), VertexRecord::new(id, ()));
        let err = GraphSnapshot::from_partitions(p, parts).unwrap_err();
        assert!(matches!(err, GraphError::Contract(_)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "GraphSnapshot broke an invariant")]
    fn debug_check_panics_on_a_non_finite_weight() {
        let mut a = VertexRecord::new("a", ());
        a.out_edges.insert(VertexId::from("b"), f64::INFINITY);
        let g = GraphSnapshot::from_records(HashPartitioner::new(1), [a]).unwrap();
        g.debug_assert_invariants();
    }

    #[test]
    fn duplicate_records_are_rejected() {
        let recs = vec![VertexRecord::new("a", 1u8), VertexRecord::new("a", 2u8)];
        let err = GraphSnapshot::from_records(HashPartitioner::new(1), recs).unwrap_err();
        assert!(matches!(err, GraphError::InvalidConfig(_)));
    }

    #[test]
    fn asymmetric_edge_is_reported() {
        let g = GraphBuilder::new()
            .undirected_edge("a", "b", 1.0)
            .edge("b", "c")
            .build()
            .unwrap();
        assert_eq!(
            g.find_asymmetric_edge(),
            Some((VertexId::from("b"), VertexId::from("c")))
        );
        assert!(g.require_undirected("test").is_err());
    }

    #[test]
    fn map_labels_keeps_adjacency() {
        let g = GraphBuilder::new().edge("a", "b").build().unwrap();
        let mapped = g.map_labels(|r| Ok(r.out_degree())).unwrap();
        assert_eq!(mapped.label("a"), Some(&1));
        assert_eq!(mapped.label("b"), Some(&0));
        assert_eq!(mapped.get(&"b".into()).unwrap().in_degree(), 1);
    }
}
