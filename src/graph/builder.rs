//! Fluent construction of raw input graphs.

use std::collections::BTreeMap;

use crate::graph::labels::{LabelMap, TypedValue};
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;
use crate::partitioning::HashPartitioner;

/// Builds a [`GraphSnapshot<LabelMap>`] from edges and per-vertex labels.
///
/// Endpoints of every edge become vertices; `in_edges` are derived from the
/// out-edges. Adding the same directed edge twice keeps the last weight.
///
/// ```
/// use graph_rounds::graph::GraphBuilder;
///
/// let g = GraphBuilder::new()
///     .partitions(2)
///     .undirected_edge("a", "b", 1.0)
///     .edge("b", "c")
///     .label("a", "isSeed", true)
///     .build()
///     .unwrap();
/// assert_eq!(g.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    n_parts: usize,
    vertices: BTreeMap<VertexId, LabelMap>,
    edges: Vec<(VertexId, VertexId, f64)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            n_parts: 1,
            ..Self::default()
        }
    }

    /// Number of partitions of the produced snapshot.
    pub fn partitions(mut self, n_parts: usize) -> Self {
        self.n_parts = n_parts;
        self
    }

    /// Adds an isolated vertex (no-op if it already exists).
    pub fn vertex(mut self, id: impl Into<VertexId>) -> Self {
        self.vertices.entry(id.into()).or_default();
        self
    }

    /// Attaches a named label to a vertex, creating the vertex if needed.
    pub fn label(
        mut self,
        id: impl Into<VertexId>,
        name: &str,
        value: impl Into<TypedValue>,
    ) -> Self {
        self.vertices.entry(id.into()).or_default().set(name, value);
        self
    }

    /// Directed edge with weight `1.0`.
    pub fn edge(self, from: impl Into<VertexId>, to: impl Into<VertexId>) -> Self {
        self.weighted_edge(from, to, 1.0)
    }

    pub fn weighted_edge(
        mut self,
        from: impl Into<VertexId>,
        to: impl Into<VertexId>,
        weight: f64,
    ) -> Self {
        let (from, to) = (from.into(), to.into());
        self.vertices.entry(from.clone()).or_default();
        self.vertices.entry(to.clone()).or_default();
        self.edges.push((from, to, weight));
        self
    }

    /// Both `a -> b` and `b -> a` with the same weight.
    pub fn undirected_edge(
        self,
        a: impl Into<VertexId>,
        b: impl Into<VertexId>,
        weight: f64,
    ) -> Self {
        let (a, b) = (a.into(), b.into());
        self.weighted_edge(a.clone(), b.clone(), weight)
            .weighted_edge(b, a, weight)
    }

    /// Assembles the snapshot.
    ///
    /// Fails on empty vertex ids and non-finite edge weights.
    pub fn build(self) -> Result<GraphSnapshot<LabelMap>, GraphError> {
        if self.vertices.keys().any(VertexId::is_empty) {
            return Err(GraphError::InvalidConfig("vertex ids must be non-empty".into()));
        }
        let mut records: BTreeMap<VertexId, VertexRecord<LabelMap>> = self
            .vertices
            .into_iter()
            .map(|(id, labels)| (id.clone(), VertexRecord::new(id, labels)))
            .collect();
        for (from, to, w) in self.edges {
            if !w.is_finite() {
                return Err(GraphError::InvalidConfig(format!(
                    "edge `{from}` -> `{to}` has non-finite weight {w}"
                )));
            }
            if let Some(r) = records.get_mut(&from) {
                r.out_edges.insert(to.clone(), w);
            }
            if let Some(r) = records.get_mut(&to) {
                r.in_edges.insert(from, w);
            }
        }
        GraphSnapshot::from_records(HashPartitioner::new(self.n_parts), records.into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_edges_mirror_out_edges() {
        let g = GraphBuilder::new()
            .weighted_edge("a", "b", 2.5)
            .edge("c", "b")
            .build()
            .unwrap();
        let b = g.get(&"b".into()).unwrap();
        assert_eq!(b.in_degree(), 2);
        assert_eq!(b.in_edges.get("a"), Some(&2.5));
        assert_eq!(b.out_degree(), 0);
    }

    #[test]
    fn labels_create_vertices() {
        let g = GraphBuilder::new()
            .label("solo", "isSeed", true)
            .build()
            .unwrap();
        assert!(g.label("solo").unwrap().flag("isSeed"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(GraphBuilder::new().vertex("").build().is_err());
        assert!(
            GraphBuilder::new()
                .weighted_edge("a", "b", f64::NAN)
                .build()
                .is_err()
        );
    }
}
