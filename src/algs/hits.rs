//! HITS hubs and authorities.
//!
//! Main stage: every vertex sends its hub score along its out-edges and its
//! authority score against its in-edges, then recomputes
//! `authority = Σ hub(in-neighbors)` and `hub = Σ authority(out-neighbors)`
//! and posts the squares to `hits.authority` / `hits.hub`. The correction
//! stage divides by the resulting L2 norms and decides convergence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algs::require_round_bound;
use crate::engine::aggregate::AggregateTotals;
use crate::engine::context::TaskContext;
use crate::engine::driver::Algorithm;
use crate::engine::program::{Emission, VertexProgram, ordered_sum};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

pub const AUTHORITY_NORM: &str = "hits.authority";
pub const HUB_NORM: &str = "hits.hub";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitsConfig {
    pub threshold: f64,
    pub max_rounds: usize,
}

impl Default for HitsConfig {
    fn default() -> Self {
        Self {
            threshold: 1e-6,
            max_rounds: 100,
        }
    }
}

impl HitsConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(GraphError::InvalidConfig(format!(
                "hits: threshold {} must be positive",
                self.threshold
            )));
        }
        require_round_bound("hits", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsLabel {
    pub hub: f64,
    pub authority: f64,
    pub prev_hub: f64,
    pub prev_authority: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitsMessage {
    /// Hub score of an in-neighbor.
    Hub(f64),
    /// Authority score of an out-neighbor.
    Authority(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitsProgram {
    Main,
    Normalize {
        authority_norm: f64,
        hub_norm: f64,
        threshold: f64,
    },
}

impl VertexProgram for HitsProgram {
    type Label = HitsLabel;
    type Payload = HitsMessage;

    fn name(&self) -> &'static str {
        match self {
            HitsProgram::Main => "hits",
            HitsProgram::Normalize { .. } => "hits-normalize",
        }
    }

    fn emit(
        &self,
        vertex: &VertexRecord<HitsLabel>,
        ctx: &mut TaskContext,
    ) -> Result<Emission<HitsLabel, HitsMessage>, GraphError> {
        let mut next = vertex.clone();
        match *self {
            HitsProgram::Main => {
                next.label.prev_hub = vertex.label.hub;
                next.label.prev_authority = vertex.label.authority;
                let mut emission = Emission::keep(next);
                for to in vertex.out_neighbors() {
                    emission.push(to.clone(), HitsMessage::Hub(vertex.label.hub));
                }
                for from in vertex.in_neighbors() {
                    emission.push(from.clone(), HitsMessage::Authority(vertex.label.authority));
                }
                Ok(emission)
            }
            HitsProgram::Normalize {
                authority_norm,
                hub_norm,
                threshold,
            } => {
                let label = &mut next.label;
                if authority_norm > 0.0 {
                    label.authority /= authority_norm;
                }
                if hub_norm > 0.0 {
                    label.hub /= hub_norm;
                }
                if (label.authority - label.prev_authority).abs() > threshold
                    || (label.hub - label.prev_hub).abs() > threshold
                {
                    ctx.mark_dirty();
                }
                Ok(Emission::keep(next))
            }
        }
    }

    fn merge(
        &self,
        id: &VertexId,
        prior: Option<VertexRecord<HitsLabel>>,
        messages: Vec<HitsMessage>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<HitsLabel>>, GraphError> {
        let Some(mut record) = prior else {
            if messages.is_empty() {
                return Ok(None);
            }
            return Err(GraphError::merge_failure(id, "received scores but is not in the graph"));
        };
        if *self != HitsProgram::Main {
            return Ok(Some(record));
        }
        let mut hubs = Vec::new();
        let mut authorities = Vec::new();
        for message in messages {
            match message {
                HitsMessage::Hub(h) => hubs.push(h),
                HitsMessage::Authority(a) => authorities.push(a),
            }
        }
        record.label.authority = ordered_sum(hubs);
        record.label.hub = ordered_sum(authorities);
        ctx.post_aggregate(AUTHORITY_NORM, record.label.authority * record.label.authority);
        ctx.post_aggregate(HUB_NORM, record.label.hub * record.label.hub);
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Hits {
    pub config: HitsConfig,
}

impl Hits {
    pub fn new(config: HitsConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for Hits {
    type Label = HitsLabel;
    type Program = HitsProgram;
    type State = ();

    fn name(&self) -> &'static str {
        "hits"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, _input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()
    }

    fn initialize(&self, _state: &(), _record: &VertexRecord<LabelMap>) -> Result<HitsLabel, GraphError> {
        Ok(HitsLabel {
            hub: 1.0,
            authority: 1.0,
            prev_hub: 1.0,
            prev_authority: 1.0,
        })
    }

    fn program(&self, _state: &(), _round: usize) -> HitsProgram {
        HitsProgram::Main
    }

    fn correction(&self, _state: &(), totals: &AggregateTotals) -> Option<HitsProgram> {
        let authority_norm = totals.get(AUTHORITY_NORM).sqrt();
        let hub_norm = totals.get(HUB_NORM).sqrt();
        if authority_norm == 0.0 && hub_norm == 0.0 {
            return None;
        }
        Some(HitsProgram::Normalize {
            authority_norm,
            hub_norm,
            threshold: self.config.threshold,
        })
    }
}

pub fn hub_scores(snapshot: &GraphSnapshot<HitsLabel>) -> BTreeMap<VertexId, f64> {
    snapshot.records().map(|r| (r.id.clone(), r.label.hub)).collect()
}

pub fn authority_scores(snapshot: &GraphSnapshot<HitsLabel>) -> BTreeMap<VertexId, f64> {
    snapshot
        .records()
        .map(|r| (r.id.clone(), r.label.authority))
        .collect()
}
