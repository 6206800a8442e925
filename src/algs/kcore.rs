//! k-core by iterative degree pruning.
//!
//! A vertex with fewer than `k` neighbors removes itself and tells its
//! neighbors, which drop the edges in the same round's merge. Pruning repeats
//! until a round removes nobody; what is left is the k-core.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::algs::require_round_bound;
use crate::engine::context::TaskContext;
use crate::engine::driver::{Algorithm, RoundReport, Verdict};
use crate::engine::program::{Emission, VertexProgram};
use crate::graph::labels::LabelMap;
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;

/// Counter of vertices removed in a round.
pub const REMOVED: &str = "kcore.removed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KCoreConfig {
    pub k: usize,
    pub max_rounds: usize,
}

impl Default for KCoreConfig {
    fn default() -> Self {
        Self {
            k: 2,
            max_rounds: 10_000,
        }
    }
}

impl KCoreConfig {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        require_round_bound("kcore", self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KCoreLabel {
    /// Neighbor count after the last merge.
    pub degree: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct KCoreProgram {
    pub k: usize,
}

impl VertexProgram for KCoreProgram {
    type Label = KCoreLabel;
    /// Id of a neighbor that removed itself.
    type Payload = VertexId;

    fn name(&self) -> &'static str {
        "kcore"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<KCoreLabel>,
        ctx: &mut TaskContext,
    ) -> Result<Emission<KCoreLabel, VertexId>, GraphError> {
        if vertex.out_degree() >= self.k {
            return Ok(Emission::keep(vertex.clone()));
        }
        ctx.increment(REMOVED, 1);
        ctx.mark_dirty();
        let mut emission = Emission::drop_vertex();
        for to in vertex.all_neighbors() {
            emission.push(to.clone(), vertex.id.clone());
        }
        Ok(emission)
    }

    fn merge(
        &self,
        _id: &VertexId,
        prior: Option<VertexRecord<KCoreLabel>>,
        messages: Vec<VertexId>,
        _ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<KCoreLabel>>, GraphError> {
        // Removed vertices stay removed even when a neighbor's notice arrives.
        let Some(mut record) = prior else {
            return Ok(None);
        };
        for gone in &messages {
            record.detach(gone);
        }
        record.label.degree = record.out_degree();
        Ok(Some(record))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KCoreState {
    pub removed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct KCore {
    pub config: KCoreConfig,
}

impl KCore {
    pub fn new(config: KCoreConfig) -> Self {
        Self { config }
    }
}

impl Algorithm for KCore {
    type Label = KCoreLabel;
    type Program = KCoreProgram;
    type State = KCoreState;

    fn name(&self) -> &'static str {
        "kcore"
    }

    fn max_rounds(&self) -> usize {
        self.config.max_rounds
    }

    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        self.config.validate()?;
        input.require_undirected("kcore")
    }

    fn initialize(&self, _state: &KCoreState, record: &VertexRecord<LabelMap>) -> Result<KCoreLabel, GraphError> {
        Ok(KCoreLabel {
            degree: record.out_degree(),
        })
    }

    fn program(&self, _state: &KCoreState, _round: usize) -> KCoreProgram {
        KCoreProgram { k: self.config.k }
    }

    fn advance(&self, state: &mut KCoreState, report: &RoundReport) -> Result<Verdict, GraphError> {
        let removed = report.counters.get(REMOVED);
        state.removed += removed;
        Ok(if removed == 0 {
            Verdict::Converged
        } else {
            Verdict::Continue
        })
    }
}

/// Ids of the vertices left in the core.
pub fn members(snapshot: &GraphSnapshot<KCoreLabel>) -> BTreeSet<VertexId> {
    snapshot.records().map(|r| r.id.clone()).collect()
}
