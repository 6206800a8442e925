//! PageRank power iteration with dangling-mass correction.
//!
//! The main stage of a round splits every reachable vertex's score evenly
//! over its out-edges; vertices without out-edges post their whole score to
//! the `pagerank.dangling` channel instead. When that total is non-zero the
//! driver runs a correction stage that hands `damping * total * init_weight`
//! back to every reachable vertex, and the correction's signal decides
//! convergence for the round.
//!
//! With seeds (config `seeds` or the `isSeed` label) the run is personalized:
//! seeds share the teleport weight `1 / |seeds|`, every other vertex gets 0.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algs::{require_round_bound, require_vertex};
use crate::engine::aggregate::AggregateTotals;
use crate::engine::context::TaskContext;
use crate::engine::driver::{Algorithm, RoundReport, Verdict};
use crate::engine::program::{Emission, VertexProgram, ordered_sum};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Channel carrying the score stranded at vertices without out-edges.
pub const DANGLING: &str = "pagerank.dangling";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    /// A round is dirty while any score moves by more than this.
    pub threshold: f64,
    pub max_rounds: usize,
    /// Personalization seeds, in addition to vertices flagged with `seed_label`.
    pub seeds: Vec<VertexId>,
    pub seed_label: String,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            threshold: 1e-6,
            max_rounds: 100,
            seeds: Vec::new(),
            seed_label: "isSeed".to_string(),
        }
    }
}

impl PageRankConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(GraphError::InvalidConfig(format!(
                "pagerank: damping {} is outside [0, 1]",
                self.damping
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(GraphError::InvalidConfig(format!(
                "pagerank: threshold {} must be positive",
                self.threshold
            )));
        }
        require_round_bound("pagerank", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankLabel {
    pub score: f64,
    /// Score at the start of the current round.
    pub prev_score: f64,
    /// Teleport weight: `1/N`, or `1/|seeds|` on seeds in personalized mode.
    pub init_weight: f64,
    /// Holds teleport weight or has received mass from a reachable vertex.
    pub reachable: bool,
    pub is_seed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageRankProgram {
    Main { damping: f64, threshold: f64 },
    Redistribute { damping: f64, threshold: f64, total: f64 },
}

impl VertexProgram for PageRankProgram {
    type Label = RankLabel;
    /// Share of a neighbor's score.
    type Payload = f64;

    fn name(&self) -> &'static str {
        match self {
            PageRankProgram::Main { .. } => "pagerank",
            PageRankProgram::Redistribute { .. } => "pagerank-redistribute",
        }
    }

    fn emit(
        &self,
        vertex: &VertexRecord<RankLabel>,
        ctx: &mut TaskContext,
    ) -> Result<Emission<RankLabel, f64>, GraphError> {
        match *self {
            PageRankProgram::Main { .. } => {
                let mut next = vertex.clone();
                next.label.prev_score = vertex.label.score;
                let mut emission = Emission::keep(next);
                if !vertex.label.reachable {
                    return Ok(emission);
                }
                let degree = vertex.out_degree();
                if degree == 0 {
                    ctx.post_aggregate(DANGLING, vertex.label.score);
                } else {
                    let share = vertex.label.score / degree as f64;
                    for to in vertex.out_neighbors() {
                        emission.push(to.clone(), share);
                    }
                }
                Ok(emission)
            }
            PageRankProgram::Redistribute {
                damping,
                threshold,
                total,
            } => {
                let mut next = vertex.clone();
                if next.label.reachable {
                    next.label.score += damping * total * next.label.init_weight;
                }
                if (next.label.score - next.label.prev_score).abs() > threshold {
                    ctx.mark_dirty();
                }
                Ok(Emission::keep(next))
            }
        }
    }

    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<RankLabel>>,
        messages: Vec<f64>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<RankLabel>>, GraphError> {
        let Some(mut record) = prior else {
            if messages.is_empty() {
                return Ok(None);
            }
            return Err(GraphError::merge_failure(id, "received rank mass but is not in the graph"));
        };
        let PageRankProgram::Main { damping, threshold } = *self else {
            return Ok(Some(record));
        };
        let label = &mut record.label;
        label.reachable |= !messages.is_empty();
        label.score = damping * ordered_sum(messages) + (1.0 - damping) * label.init_weight;
        if (label.score - label.prev_score).abs() > threshold {
            ctx.mark_dirty();
        }
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageRankState {
    pub vertex_count: usize,
    pub seeds: BTreeSet<VertexId>,
    /// Dangling total of every finished round.
    pub dangling_history: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PageRank {
    pub config: PageRankConfig,
}

impl PageRank {
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for PageRank {
    type Label = RankLabel;
    type Program = PageRankProgram;
    type State = PageRankState;

    fn name(&self) -> &'static str {
        "pagerank"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()?;
        for seed in &self.config.seeds {
            require_vertex(input, seed)?;
        }
        if input.is_empty() {
            return Err(GraphError::InvalidConfig("pagerank: empty graph".into()));
        }
        Ok(())
    }

    fn initial_state(&self, input: &GraphSnapshot<LabelMap>) -> PageRankState {
        let mut seeds: BTreeSet<VertexId> = self.config.seeds.iter().cloned().collect();
        seeds.extend(
            input
                .records()
                .filter(|r| r.label.flag(&self.config.seed_label))
                .map(|r| r.id.clone()),
        );
        PageRankState {
            vertex_count: input.len(),
            seeds,
            dangling_history: Vec::new(),
        }
    }

    fn initialize(
        &self,
        state: &PageRankState,
        record: &VertexRecord<LabelMap>,
    ) -> Result<RankLabel, GraphError> {
        let is_seed = state.seeds.contains(&record.id);
        let init_weight = if state.seeds.is_empty() {
            1.0 / state.vertex_count as f64
        } else if is_seed {
            1.0 / state.seeds.len() as f64
        } else {
            0.0
        };
        Ok(RankLabel {
            score: init_weight,
            prev_score: init_weight,
            init_weight,
            reachable: init_weight > 0.0,
            is_seed,
        })
    }

    fn program(&self, _state: &PageRankState, _round: usize) -> PageRankProgram {
        PageRankProgram::Main {
            damping: self.config.damping,
            threshold: self.config.threshold,
        }
    }

    fn correction(&self, _state: &PageRankState, totals: &AggregateTotals) -> Option<PageRankProgram> {
        let total = totals.get(DANGLING);
        (total != 0.0).then_some(PageRankProgram::Redistribute {
            damping: self.config.damping,
            threshold: self.config.threshold,
            total,
        })
    }

    fn advance(&self, state: &mut PageRankState, report: &RoundReport) -> Result<Verdict, GraphError> {
        state.dangling_history.push(report.totals.get(DANGLING));
        Ok(if report.signal_raised {
            Verdict::Continue
        } else {
            Verdict::Converged
        })
    }
}

pub fn scores(snapshot: &GraphSnapshot<RankLabel>) -> BTreeMap<VertexId, f64> {
    snapshot
        .records()
        .map(|r| (r.id.clone(), r.label.score))
        .collect()
}

/// Sum of all scores, independent of iteration order.
pub fn total_mass(snapshot: &GraphSnapshot<RankLabel>) -> f64 {
    ordered_sum(snapshot.records().map(|r| r.label.score).collect())
}

/// The `k` highest-scoring vertices, ties broken by id.
pub fn top_k(snapshot: &GraphSnapshot<RankLabel>, k: usize) -> Vec<(VertexId, f64)> {
    let mut all: Vec<_> = snapshot
        .records()
        .map(|r| (r.id.clone(), r.label.score))
        .collect();
    all.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    all.truncate(k);
    all
}
