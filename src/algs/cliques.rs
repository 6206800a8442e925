//! Maximal cliques from one-hop neighborhoods.
//!
//! In the first round every vertex sends its neighbor set (both edge
//! directions, self-loops ignored) to each neighbor. The merge then knows the
//! subgraph induced by its closed neighborhood and runs Bron–Kerbosch with
//! pivoting on it, keeping only cliques whose smallest member is the vertex
//! itself, so each maximal clique is reported by exactly one vertex.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algs::require_round_bound;
use crate::engine::context::TaskContext;
use crate::engine::driver::Algorithm;
use crate::engine::program::{Emission, VertexProgram};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliqueConfig {
    /// Cliques smaller than this are not reported.
    pub min_size: usize,
    pub max_rounds: usize,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_rounds: 4,
        }
    }
}

impl CliqueConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.min_size == 0 {
            return Err(GraphError::InvalidConfig(
                "cliques: min_size must be at least 1".into(),
            ));
        }
        require_round_bound("cliques", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliqueLabel {
    pub computed: bool,
    /// Maximal cliques led by this vertex, each sorted ascending.
    pub cliques: Vec<Vec<VertexId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborSet {
    pub from: VertexId,
    pub neighbors: BTreeSet<VertexId>,
}

#[derive(Debug, Clone, Copy)]
pub struct CliqueProgram {
    pub min_size: usize,
}

fn neighbor_set<L>(vertex: &VertexRecord<L>) -> BTreeSet<VertexId> {
    vertex
        .all_neighbors()
        .filter(|n| **n != vertex.id)
        .cloned()
        .collect()
}

impl VertexProgram for CliqueProgram {
    type Label = CliqueLabel;
    type Payload = NeighborSet;

    fn name(&self) -> &'static str {
        "cliques"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<CliqueLabel>,
        _ctx: &mut TaskContext,
    ) -> Result<Emission<CliqueLabel, NeighborSet>, GraphError> {
        let mut emission = Emission::keep(vertex.clone());
        if vertex.label.computed {
            return Ok(emission);
        }
        let neighbors = neighbor_set(vertex);
        for to in &neighbors {
            emission.push(
                to.clone(),
                NeighborSet {
                    from: vertex.id.clone(),
                    neighbors: neighbors.clone(),
                },
            );
        }
        Ok(emission)
    }

    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<CliqueLabel>>,
        messages: Vec<NeighborSet>,
        _ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<CliqueLabel>>, GraphError> {
        let Some(mut record) = prior else {
            return Ok(None);
        };
        if record.label.computed {
            return Ok(Some(record));
        }
        let own = neighbor_set(&record);
        let mut adjacency: BTreeMap<VertexId, BTreeSet<VertexId>> = own
            .iter()
            .map(|n| (n.clone(), BTreeSet::new()))
            .collect();
        for message in messages {
            if let Some(adj) = adjacency.get_mut(&message.from) {
                adj.extend(message.neighbors.into_iter().filter(|n| own.contains(n)));
            }
        }
        // Keep the local graph symmetric even when only one side reported.
        let pairs: Vec<(VertexId, VertexId)> = adjacency
            .iter()
            .flat_map(|(u, adj)| adj.iter().map(move |w| (u.clone(), w.clone())))
            .collect();
        for (u, w) in pairs {
            if let Some(adj) = adjacency.get_mut(&w) {
                adj.insert(u);
            }
        }

        let candidates: BTreeSet<VertexId> = own.iter().filter(|n| *n > id).cloned().collect();
        let excluded: BTreeSet<VertexId> = own.iter().filter(|n| *n < id).cloned().collect();
        let mut found = Vec::new();
        bron_kerbosch(&adjacency, vec![id.clone()], candidates, excluded, &mut found);
        found.retain(|c| c.len() >= self.min_size);
        for clique in &mut found {
            clique.sort();
        }
        found.sort();
        record.label.cliques = found;
        record.label.computed = true;
        Ok(Some(record))
    }
}

/// Bron–Kerbosch with pivoting. The pivot maximizes `|P ∩ N(u)|`, ties
/// broken by smallest id.
fn bron_kerbosch(
    adjacency: &BTreeMap<VertexId, BTreeSet<VertexId>>,
    clique: Vec<VertexId>,
    mut candidates: BTreeSet<VertexId>,
    mut excluded: BTreeSet<VertexId>,
    out: &mut Vec<Vec<VertexId>>,
) {
    if candidates.is_empty() {
        if excluded.is_empty() {
            out.push(clique);
        }
        return;
    }
    let empty = BTreeSet::new();
    let neighbors = |v: &VertexId| adjacency.get(v).unwrap_or(&empty);
    let pivot = candidates
        .iter()
        .chain(excluded.iter())
        .max_by(|a, b| {
            let ca = candidates.intersection(neighbors(a)).count();
            let cb = candidates.intersection(neighbors(b)).count();
            ca.cmp(&cb).then_with(|| b.cmp(a))
        })
        .cloned();
    let pivot_neighbors = pivot.as_ref().map(neighbors).unwrap_or(&empty);
    let branch: Vec<VertexId> = candidates.difference(pivot_neighbors).cloned().collect();
    for v in branch {
        let nv = neighbors(&v);
        let mut next = clique.clone();
        next.push(v.clone());
        bron_kerbosch(
            adjacency,
            next,
            candidates.intersection(nv).cloned().collect(),
            excluded.intersection(nv).cloned().collect(),
            out,
        );
        candidates.remove(&v);
        excluded.insert(v);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaximalCliques {
    pub config: CliqueConfig,
}

impl MaximalCliques {
    pub fn new(config: CliqueConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for MaximalCliques {
    type Label = CliqueLabel;
    type Program = CliqueProgram;
    type State = ();

    fn name(&self) -> &'static str {
        "cliques"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, _input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()
    }

    fn initialize(&self, _state: &(), _record: &VertexRecord<LabelMap>) -> Result<CliqueLabel, GraphError> {
        Ok(CliqueLabel {
            computed: false,
            cliques: Vec::new(),
        })
    }

    fn program(&self, _state: &(), _round: usize) -> CliqueProgram {
        CliqueProgram {
            min_size: self.config.min_size,
        }
    }
}

/// Every maximal clique of the graph, sorted.
pub fn all_cliques(snapshot: &GraphSnapshot<CliqueLabel>) -> Vec<Vec<VertexId>> {
    let mut all: Vec<_> = snapshot
        .records()
        .flat_map(|r| r.label.cliques.iter().cloned())
        .collect();
    all.sort();
    all
}
