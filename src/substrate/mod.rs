//! Execution substrates: who runs the emit and merge tasks of a round.
//!
//! The driver only sees the [`Substrate`] trait. Two implementations ship with
//! the crate:
//!
//! - [`SerialSubstrate`]: runs every task on the calling thread, and can
//!   permute message order and re-execute tasks for testing.
//! - [`RayonSubstrate`] (feature `rayon`): runs the emit tasks and then the
//!   merge tasks of a round as two parallel stages over partitions.
//!
//! Both share the task bodies in this module, so they only differ in how
//! tasks are scheduled.

pub mod serial;
#[cfg(feature = "rayon")]
pub mod rayon;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::engine::aggregate::AggregationService;
use crate::engine::context::{CancellationToken, Stage, TaskContext, TaskId, TaskOutcome, TaskPhase};
use crate::engine::counters::RoundCounters;
use crate::engine::program::VertexProgram;
use crate::engine::signal::ConvergenceSignal;
use crate::engine::wire::{KIND_SHUFFLE, decode_frame, encode_frame};
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::Partition;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;
use crate::partitioning::{HashPartitioner, PartitionId};
use crate::storage::{Location, SnapshotStore};

#[cfg(feature = "rayon")]
pub use self::rayon::RayonSubstrate;
pub use serial::SerialSubstrate;

/// Per-stage services a substrate hands to its tasks.
#[derive(Clone, Copy)]
pub struct RoundServices<'a> {
    pub round: usize,
    pub stage: Stage,
    pub aggregator: &'a dyn AggregationService,
    pub cancel: &'a CancellationToken,
}

impl std::fmt::Debug for RoundServices<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundServices")
            .field("round", &self.round)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// What a substrate reports back for one executed stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundResult {
    pub record_count_in: usize,
    pub record_count_out: usize,
    pub message_count: usize,
    /// OR of all partition flags raised during the stage.
    pub signal_raised: bool,
    pub counters: RoundCounters,
}

/// Runs one round stage of a [`VertexProgram`] from `input` to `output`.
///
/// Guarantees: every vertex of `input` is emitted once per kept attempt,
/// every message is grouped by destination once before merge runs, and
/// nothing is written to `output` unless every task succeeded. When the
/// cancellation token fires between the emit and merge phases, in-flight
/// messages are dropped and [`GraphError::Cancelled`] is returned.
pub trait Substrate: Send + Sync {
    fn name(&self) -> &'static str;

    fn run_round<P, S>(
        &self,
        program: &P,
        store: &S,
        input: &Location,
        output: &Location,
        services: &RoundServices<'_>,
    ) -> Result<RoundResult, GraphError>
    where
        P: VertexProgram,
        S: SnapshotStore;
}

/// What reaches a destination in the shuffle: the vertex's own update, or a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Inbound<L, P> {
    Prior(VertexRecord<L>),
    Message(P),
}

/// Everything addressed to one vertex id.
#[derive(Debug, Clone)]
pub(crate) struct Group<L, P> {
    pub prior: Option<VertexRecord<L>>,
    pub messages: Vec<P>,
}

pub(crate) type Groups<L, P> = hashbrown::HashMap<VertexId, Group<L, P>>;

/// Output of an emit task, bucketed by destination partition.
pub(crate) struct EmitBatch<L, P> {
    pub outbound: Vec<Vec<(VertexId, Inbound<L, P>)>>,
    pub messages: usize,
}

/// Shuffle mailbox: one encoded frame per (source, destination) partition pair.
///
/// Posting the same pair again replaces the frame, so a re-executed emit
/// task leaves exactly one batch behind.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    frames: DashMap<(PartitionId, PartitionId), bytes::Bytes>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post<L, P>(
        &self,
        src: PartitionId,
        outbound: Vec<Vec<(VertexId, Inbound<L, P>)>>,
    ) -> Result<(), GraphError>
    where
        L: Serialize,
        P: Serialize,
    {
        for (dst, batch) in outbound.into_iter().enumerate() {
            if batch.is_empty() {
                self.frames.remove(&(src, dst));
                continue;
            }
            let frame = encode_frame(KIND_SHUFFLE, &batch)?;
            self.frames.insert((src, dst), frame);
        }
        Ok(())
    }

    /// Removes and decodes every frame addressed to `dst`, grouped by vertex id.
    pub fn collect<L, P>(&self, dst: PartitionId, n_parts: usize) -> Result<Groups<L, P>, GraphError>
    where
        L: serde::de::DeserializeOwned,
        P: serde::de::DeserializeOwned,
    {
        let mut groups: Groups<L, P> = hashbrown::HashMap::new();
        for src in 0..n_parts {
            let Some((_, frame)) = self.frames.remove(&(src, dst)) else {
                continue;
            };
            let batch: Vec<(VertexId, Inbound<L, P>)> = decode_frame(KIND_SHUFFLE, &frame)?;
            for (id, inbound) in batch {
                let group = groups.entry(id).or_insert_with(|| Group {
                    prior: None,
                    messages: Vec::new(),
                });
                match inbound {
                    Inbound::Message(p) => group.messages.push(p),
                    Inbound::Prior(record) => {
                        if group.prior.is_some() {
                            return Err(GraphError::Contract(format!(
                                "vertex `{}` was emitted twice in one round",
                                record.id
                            )));
                        }
                        group.prior = Some(record);
                    }
                }
            }
        }
        Ok(groups)
    }
}

fn task_id(services: &RoundServices<'_>, phase: TaskPhase, partition: PartitionId) -> TaskId {
    TaskId {
        round: services.round,
        stage: services.stage,
        phase,
        partition,
    }
}

/// Emits every record of one partition.
pub(crate) fn emit_task<P: VertexProgram>(
    program: &P,
    services: &RoundServices<'_>,
    partition: PartitionId,
    records: &Partition<P::Label>,
    partitioner: &HashPartitioner,
) -> Result<(EmitBatch<P::Label, P::Payload>, TaskOutcome), GraphError> {
    let mut ctx = TaskContext::new(task_id(services, TaskPhase::Emit, partition));
    let mut outbound: Vec<Vec<_>> = (0..partitioner.n_parts()).map(|_| Vec::new()).collect();
    let mut messages = 0;
    for record in records.values() {
        let emission = program.emit(record, &mut ctx)?;
        if let Some(update) = emission.update {
            if update.id != record.id {
                return Err(GraphError::Contract(format!(
                    "{}: `{}` emitted an update for `{}`",
                    program.name(),
                    record.id,
                    update.id
                )));
            }
            let dst = partitioner.part_of(&update.id);
            outbound[dst].push((update.id.clone(), Inbound::Prior(update)));
        }
        for message in emission.messages {
            messages += 1;
            let dst = partitioner.part_of(&message.destination);
            outbound[dst].push((message.destination, Inbound::Message(message.payload)));
        }
    }
    Ok((EmitBatch { outbound, messages }, ctx.finish()))
}

/// Merges every group addressed to one partition.
pub(crate) fn merge_task<P: VertexProgram>(
    program: &P,
    services: &RoundServices<'_>,
    partition: PartitionId,
    groups: Groups<P::Label, P::Payload>,
) -> Result<(Partition<P::Label>, TaskOutcome), GraphError> {
    let mut ctx = TaskContext::new(task_id(services, TaskPhase::Merge, partition));
    let mut out = Partition::new();
    // id order keeps the task's aggregate partials bit-reproducible
    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    for (id, group) in groups {
        let merged = program.merge(&id, group.prior, group.messages, &mut ctx)?;
        if let Some(record) = merged {
            if record.id != id {
                return Err(GraphError::Contract(format!(
                    "{}: merge for `{id}` returned a record for `{}`",
                    program.name(),
                    record.id
                )));
            }
            out.insert(id, record);
        }
    }
    Ok((out, ctx.finish()))
}

/// Runs a task `1 + retries` times, publishing the side effects of every
/// attempt and keeping the result and counters of the last one.
pub(crate) fn run_task<T>(
    retries: usize,
    services: &RoundServices<'_>,
    signal: &ConvergenceSignal,
    mut task: impl FnMut() -> Result<(T, TaskOutcome), GraphError>,
) -> Result<(T, RoundCounters), GraphError> {
    let mut attempt = 0;
    loop {
        let (value, outcome) = task()?;
        publish(&outcome, services, signal)?;
        if attempt == retries {
            return Ok((value, outcome.counters));
        }
        log::debug!("re-executing task {} (attempt {})", outcome.task, attempt + 2);
        attempt += 1;
    }
}

fn publish(
    outcome: &TaskOutcome,
    services: &RoundServices<'_>,
    signal: &ConvergenceSignal,
) -> Result<(), GraphError> {
    for (channel, value) in &outcome.aggregates {
        services.aggregator.post(&outcome.task, channel, *value)?;
    }
    if outcome.dirty {
        signal.raise(outcome.task.partition);
    }
    Ok(())
}

/// Fails with [`GraphError::Cancelled`] once the token has fired.
pub(crate) fn check_cancelled(services: &RoundServices<'_>) -> Result<(), GraphError> {
    if services.cancel.is_cancelled() {
        log::info!(
            "round {} ({:?}) cancelled; discarding in-flight messages",
            services.round,
            services.stage
        );
        return Err(GraphError::Cancelled {
            last_snapshot: None,
        });
    }
    Ok(())
}
