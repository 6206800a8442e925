//! Breadth-first search from one source vertex.
//!
//! Each round the current frontier marks itself visited, appends itself to
//! its path and offers that path to every out-neighbor. An unvisited vertex
//! that receives offers joins the next frontier through the offer with the
//! smallest `(distance, sender)`. The run ends in the first round that
//! discovers nobody, read from the `bfs.frontier` counter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algs::{require_round_bound, require_vertex};
use crate::engine::context::TaskContext;
use crate::engine::driver::{Algorithm, RoundReport, Verdict};
use crate::engine::program::{Emission, VertexProgram};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Counter of vertices discovered in a round.
pub const FRONTIER: &str = "bfs.frontier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BfsConfig {
    pub source: VertexId,
    pub max_rounds: usize,
}

impl Default for BfsConfig {
    fn default() -> Self {
        Self {
            source: VertexId::default(),
            max_rounds: 10_000,
        }
    }
}

impl BfsConfig {
    pub fn new(source: impl Into<VertexId>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if self.source.is_empty() {
            return Err(GraphError::InvalidConfig("bfs: no source vertex".into()));
        }
        require_round_bound("bfs", self.max_rounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitStatus {
    Unvisited,
    /// Discovered last round; expands this round.
    Frontier,
    Visited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BfsLabel {
    pub status: VisitStatus,
    pub distance: Option<u32>,
    /// Path from the source. Ends with the vertex itself once it has expanded.
    pub predecessors: Vec<VertexId>,
}

/// "I am your predecessor."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub from: VertexId,
    pub distance: u32,
    pub path: Vec<VertexId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BfsProgram;

impl VertexProgram for BfsProgram {
    type Label = BfsLabel;
    type Payload = Visit;

    fn name(&self) -> &'static str {
        "bfs"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<BfsLabel>,
        _ctx: &mut TaskContext,
    ) -> Result<Emission<BfsLabel, Visit>, GraphError> {
        if vertex.label.status != VisitStatus::Frontier {
            return Ok(Emission::keep(vertex.clone()));
        }
        let distance = vertex
            .label
            .distance
            .ok_or_else(|| GraphError::emit_failure(&vertex.id, "frontier vertex without a distance"))?;
        let mut next = vertex.clone();
        next.label.status = VisitStatus::Visited;
        next.label.predecessors.push(vertex.id.clone());
        let path = next.label.predecessors.clone();
        let mut emission = Emission::keep(next);
        for to in vertex.out_neighbors() {
            emission.push(
                to.clone(),
                Visit {
                    from: vertex.id.clone(),
                    distance,
                    path: path.clone(),
                },
            );
        }
        Ok(emission)
    }

    fn merge(
        &self,
        _id: &VertexId,
        prior: Option<VertexRecord<BfsLabel>>,
        messages: Vec<Visit>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<BfsLabel>>, GraphError> {
        // Offers to ids outside the graph are dropped.
        let Some(mut record) = prior else {
            return Ok(None);
        };
        if record.label.status != VisitStatus::Unvisited {
            return Ok(Some(record));
        }
        let best = messages
            .into_iter()
            .min_by(|a, b| (a.distance, &a.from).cmp(&(b.distance, &b.from)));
        if let Some(best) = best {
            record.label.status = VisitStatus::Frontier;
            record.label.distance = Some(best.distance + 1);
            record.label.predecessors = best.path;
            ctx.increment(FRONTIER, 1);
            ctx.mark_dirty();
        }
        Ok(Some(record))
    }
}

/// Frontier size of every finished round.
#[derive(Debug, Clone, Default)]
pub struct BfsState {
    pub frontier_history: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Bfs {
    pub config: BfsConfig,
}

impl Bfs {
    pub fn new(config: BfsConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for Bfs {
    type Label = BfsLabel;
    type Program = BfsProgram;
    type State = BfsState;

    fn name(&self) -> &'static str {
        "bfs"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()?;
        require_vertex(input, &self.config.source)
    }

    fn initialize(&self, _state: &BfsState, record: &VertexRecord<LabelMap>) -> Result<BfsLabel, GraphError> {
        let is_source = record.id == self.config.source;
        Ok(BfsLabel {
            status: if is_source {
                VisitStatus::Frontier
            } else {
                VisitStatus::Unvisited
            },
            distance: is_source.then_some(0),
            predecessors: Vec::new(),
        })
    }

    fn program(&self, _state: &BfsState, _round: usize) -> BfsProgram {
        BfsProgram
    }

    fn advance(&self, state: &mut BfsState, report: &RoundReport) -> Result<Verdict, GraphError> {
        let discovered = report.counters.get(FRONTIER);
        state.frontier_history.push(discovered);
        log::debug!("bfs round {}: {discovered} newly discovered", report.round);
        Ok(if discovered == 0 {
            Verdict::Converged
        } else {
            Verdict::Continue
        })
    }
}

/// Distance of every reached vertex.
pub fn distances(snapshot: &GraphSnapshot<BfsLabel>) -> BTreeMap<VertexId, u32> {
    snapshot
        .records()
        .filter_map(|r| r.label.distance.map(|d| (r.id.clone(), d)))
        .collect()
}

/// Path from the source to `target`, both included.
pub fn path(snapshot: &GraphSnapshot<BfsLabel>, target: &str) -> Option<Vec<VertexId>> {
    let record = snapshot.get(&VertexId::from(target))?;
    record.label.distance?;
    let mut path = record.label.predecessors.clone();
    if path.last() != Some(&record.id) {
        path.push(record.id.clone());
    }
    Some(path)
}
