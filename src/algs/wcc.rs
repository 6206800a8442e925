//! Weakly-connected components by minimum-id label propagation.
//!
//! Every vertex starts in its own component named after itself. A vertex
//! whose component changed last round sends it to all neighbors, both edge
//! directions; receivers adopt the smallest id they see. The fixpoint names
//! each component after its smallest member.

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
pub struct WccConfig {
    pub max_rounds: usize,
}

impl Default for WccConfig {
    fn default() -> Self {
        Self { max_rounds: 10_000 }
    }
}

impl WccConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        require_round_bound("wcc", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WccLabel {
    pub component: VertexId,
    /// Component changed last round and has not been announced yet.
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WccProgram;

impl VertexProgram for WccProgram {
    type Label = WccLabel;
    type Payload = VertexId;

    fn name(&self) -> &'static str {
        "wcc"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<WccLabel>,
        _ctx: &mut TaskContext,
    ) -> Result<Emission<WccLabel, VertexId>, GraphError> {
        if !vertex.label.changed {
            return Ok(Emission::keep(vertex.clone()));
        }
        let mut next = vertex.clone();
        next.label.changed = false;
        let mut emission = Emission::keep(next);
        for to in vertex.all_neighbors() {
            emission.push(to.clone(), vertex.label.component.clone());
        }
        Ok(emission)
    }

    fn merge(
        &self,
        _id: &VertexId,
        prior: Option<VertexRecord<WccLabel>>,
        messages: Vec<VertexId>,
        ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<WccLabel>>, GraphError> {
        let Some(mut record) = prior else {
            return Ok(None);
        };
        if let Some(smallest) = messages.into_iter().min() {
            if smallest < record.label.component {
                record.label.component = smallest;
                record.label.changed = true;
                ctx.mark_dirty();
            }
        }
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Wcc {
    pub config: WccConfig,
}

impl Wcc {
    pub fn new(config: WccConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for Wcc {
    type Label = WccLabel;
    type Program = WccProgram;
    type State = ();

    fn name(&self) -> &'static str {
        "wcc"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, _input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()
    }

    fn initialize(&self, _state: &(), record: &VertexRecord<LabelMap>) -> Result<WccLabel, GraphError> {
        Ok(WccLabel {
            component: record.id.clone(),
            changed: true,
        })
    }

    fn program(&self, _state: &(), _round: usize) -> WccProgram {
        WccProgram
    }
}

/// Component id of every vertex.
pub fn components(snapshot: &GraphSnapshot<WccLabel>) -> BTreeMap<VertexId, VertexId> {
    snapshot
        .records()
        .map(|r| (r.id.clone(), r.label.component.clone()))
        .collect()
}

pub fn component_count(snapshot: &GraphSnapshot<WccLabel>) -> usize {
    snapshot
        .records()
        .map(|r| &r.label.component)
        .collect::<BTreeSet<_>>()
        .len()
}
