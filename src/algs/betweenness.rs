//! Single-source betweenness centrality (Brandes' dependency accumulation).
//!
//! Two driven phases over the same engine:
//!
//! 1. Forward: a BFS from the source that also sums shortest-path counts and
//!    records every shortest-path predecessor. Ends in the first round that
//!    discovers nobody.
//! 2. Backward: one round per level, deepest first. Vertices on the current
//!    level send `(paths, centrality)` to their predecessors, which add
//!    `(paths[v] / paths[w]) * (1 + bc[w])`. The level is the remaining
//!    distance; the phase ends after level 1.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algs::{require_round_bound, require_vertex};
use crate::engine::context::TaskContext;
use crate::engine::driver::{Algorithm, RoundReport, Verdict};
use crate::engine::program::{Emission, VertexProgram, ordered_sum};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Counter of vertices discovered in a forward round.
pub const FRONTIER: &str = "betweenness.frontier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetweennessConfig {
    pub source: VertexId,
    pub max_rounds: usize,
}

impl Default for BetweennessConfig {
    fn default() -> Self {
        Self {
            source: VertexId::default(),
            max_rounds: 10_000,
        }
    }
}

impl BetweennessConfig {
    pub fn new(source: impl Into<VertexId>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if self.source.is_empty() {
            return Err(GraphError::InvalidConfig(
                "betweenness: no source vertex".into(),
            ));
        }
        require_round_bound("betweenness", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BcLabel {
    pub distance: Option<u32>,
    /// Number of shortest paths from the source. Counts double per diamond,
    /// so they are carried as floats.
    pub paths: f64,
    pub predecessors: BTreeSet<VertexId>,
    pub centrality: f64,
    /// Discovered last forward round, not yet expanded.
    pub frontier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BcMessage {
    Path {
        from: VertexId,
        distance: u32,
        paths: f64,
    },
    Dependency {
        paths: f64,
        centrality: f64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Forward,
    /// Vertices at distance `level` send their dependency this round.
    Backward { level: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct BcProgram {
    pub phase: Phase,
}

impl VertexProgram for BcProgram {
    type Label = BcLabel;
    type Payload = BcMessage;

    fn name(&self) -> &'static str {
        match self.phase {
            Phase::Forward => "betweenness-forward",
            Phase::Backward { .. } => "betweenness-backward",
        }
    }

    fn emit(
        &self,
        vertex: &VertexRecord<BcLabel>,
        _ctx: &mut TaskContext,
    ) -> Result<Emission<BcLabel, BcMessage>, GraphError> {
        let label = &vertex.label;
        match self.phase {
            Phase::Forward => {
                if !label.frontier {
                    return Ok(Emission::keep(vertex.clone()));
                }
                let distance = label.distance.ok_or_else(|| {
                    GraphError::emit_failure(&vertex.id, "frontier vertex without a distance")
                })?;
                let mut next = vertex.clone();
                next.label.frontier = false;
                let mut emission = Emission::keep(next);
                for to in vertex.out_neighbors() {
                    emission.push(
                        to.clone(),
                        BcMessage::Path {
                            from: vertex.id.clone(),
                            distance,
                            paths: label.paths,
                        },
                    );
                }
                Ok(emission)
            }
            Phase::Backward { level } => {
                let mut emission = Emission::keep(vertex.clone());
                if label.distance == Some(level) {
                    for pred in &label.predecessors {
                        emission.push(
                            pred.clone(),
                            BcMessage::Dependency {
                                paths: label.paths,
                                centrality: label.centrality,
                            },
                        );
                    }
                }
                Ok(emission)
            }
        }
    }

    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<BcLabel>>,
        messages: Vec<BcMessage>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<BcLabel>>, GraphError> {
        let Some(mut record) = prior else {
            return Ok(None);
        };
        if messages.is_empty() {
            return Ok(Some(record));
        }
        match self.phase {
            Phase::Forward => {
                if record.label.distance.is_some() {
                    return Ok(Some(record));
                }
                let mut best: Option<u32> = None;
                let mut offers = Vec::new();
                for message in messages {
                    if let BcMessage::Path {
                        from,
                        distance,
                        paths,
                    } = message
                    {
                        best = Some(best.map_or(distance, |b| b.min(distance)));
                        offers.push((from, distance, paths));
                    }
                }
                let Some(best) = best else {
                    return Ok(Some(record));
                };
                let label = &mut record.label;
                label.distance = Some(best + 1);
                let mut counts = Vec::with_capacity(offers.len());
                for (from, distance, paths) in offers {
                    if distance == best {
                        counts.push(paths);
                        label.predecessors.insert(from);
                    }
                }
                label.paths = ordered_sum(counts);
                label.frontier = true;
                ctx.increment(FRONTIER, 1);
                ctx.mark_dirty();
            }
            Phase::Backward { .. } => {
                if record.label.distance == Some(0) {
                    return Ok(Some(record));
                }
                let own_paths = record.label.paths;
                let mut contributions = Vec::with_capacity(messages.len());
                for message in messages {
                    if let BcMessage::Dependency { paths, centrality } = message {
                        if !(paths > 0.0 && paths.is_finite()) {
                            return Err(GraphError::merge_failure(
                                id,
                                "dependency from a successor without shortest paths",
                            ));
                        }
                        contributions.push(own_paths / paths * (1.0 + centrality));
                    }
                }
                record.label.centrality += ordered_sum(contributions);
                ctx.mark_dirty();
            }
        }
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BetweennessState {
    pub phase: Phase,
    /// Largest distance discovered so far.
    pub depth: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Betweenness {
    pub config: BetweennessConfig,
}

impl Betweenness {
    pub fn new(config: BetweennessConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for Betweenness {
    type Label = BcLabel;
    type Program = BcProgram;
    type State = BetweennessState;

    fn name(&self) -> &'static str {
        "betweenness"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()?;
        require_vertex(input, &self.config.source)
    }

    fn initialize(
        &self,
        _state: &BetweennessState,
        record: &VertexRecord<LabelMap>,
    ) -> Result<BcLabel, GraphError> {
        let is_source = record.id == self.config.source;
        Ok(BcLabel {
            distance: is_source.then_some(0),
            paths: if is_source { 1.0 } else { 0.0 },
            predecessors: BTreeSet::new(),
            centrality: 0.0,
            frontier: is_source,
        })
    }

    fn program(&self, state: &BetweennessState, _round: usize) -> BcProgram {
        BcProgram { phase: state.phase }
    }

    fn advance(&self, state: &mut BetweennessState, report: &RoundReport) -> Result<Verdict, GraphError> {
        match state.phase {
            Phase::Forward => {
                if report.counters.get(FRONTIER) > 0 {
                    state.depth += 1;
                    return Ok(Verdict::Continue);
                }
                if state.depth == 0 {
                    return Ok(Verdict::Converged);
                }
                log::debug!("betweenness: forward phase done at depth {}", state.depth);
                state.phase = Phase::Backward { level: state.depth };
                Ok(Verdict::Continue)
            }
            Phase::Backward { level } if level <= 1 => Ok(Verdict::Converged),
            Phase::Backward { level } => {
                state.phase = Phase::Backward { level: level - 1 };
                Ok(Verdict::Continue)
            }
        }
    }
}

/// Dependency of the source on every vertex.
pub fn centrality(snapshot: &GraphSnapshot<BcLabel>) -> BTreeMap<VertexId, f64> {
    snapshot
        .records()
        .map(|r| (r.id.clone(), r.label.centrality))
        .collect()
}

/// Shortest-path counts of every reached vertex.
pub fn path_counts(snapshot: &GraphSnapshot<BcLabel>) -> BTreeMap<VertexId, f64> {
    snapshot
        .records()
        .filter(|r| r.label.distance.is_some())
        .map(|r| (r.id.clone(), r.label.paths))
        .collect()
}
