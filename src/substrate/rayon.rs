//! Rayon-parallel substrate: one task per partition per phase.

use ::rayon::prelude::*;

use crate::engine::counters::RoundCounters;
use crate::engine::program::VertexProgram;
use crate::engine::signal::ConvergenceSignal;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph_error::GraphError;
use crate::storage::{Location, SnapshotStore};
use crate::substrate::{
    Mailbox, RoundResult, RoundServices, Substrate, check_cancelled, emit_task, merge_task,
    run_task,
};

/// Runs the emit tasks, then the merge tasks, of a round on the Rayon pool.
///
/// The two `par_iter` stages are separated by a full barrier: no merge starts
/// before every emit task has posted its batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonSubstrate;

impl RayonSubstrate {
    pub fn new() -> Self {
        RayonSubstrate
    }
}

impl Substrate for RayonSubstrate {
    fn name(&self) -> &'static str {
        "rayon"
    }

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
        S: SnapshotStore,
    {
        let snapshot = store.read::<P::Label>(input)?;
        let partitioner = snapshot.partitioner();
        let n_parts = partitioner.n_parts();
        let signal = ConvergenceSignal::new(n_parts);
        let mailbox = Mailbox::new();

        let emitted: Vec<(usize, RoundCounters)> = (0..n_parts)
            .into_par_iter()
            .map(|part| {
                let (batch, counters) = run_task(0, services, &signal, || {
                    emit_task(program, services, part, snapshot.partition(part), &partitioner)
                })?;
                mailbox.post(part, batch.outbound)?;
                Ok((batch.messages, counters))
            })
            .collect::<Result<_, GraphError>>()?;

        check_cancelled(services)?;

        let merged: Vec<_> = (0..n_parts)
            .into_par_iter()
            .map(|part| {
                let groups = mailbox.collect::<P::Label, P::Payload>(part, n_parts)?;
                let mut groups = Some(groups);
                run_task(0, services, &signal, || {
                    merge_task(program, services, part, groups.take().unwrap_or_default())
                })
            })
            .collect::<Result<_, GraphError>>()?;

        let mut counters = RoundCounters::new();
        let mut message_count = 0;
        for (messages, task_counters) in &emitted {
            message_count += messages;
            counters.absorb(task_counters);
        }
        let mut partitions = Vec::with_capacity(n_parts);
        for (partition, task_counters) in merged {
            counters.absorb(&task_counters);
            partitions.push(partition);
        }

        let next = GraphSnapshot::from_partitions(partitioner, partitions)?;
        let result = RoundResult {
            record_count_in: snapshot.len(),
            record_count_out: next.len(),
            message_count,
            signal_raised: signal.is_raised(),
            counters,
        };
        store.write(output, next)?;
        log::debug!(
            "{} round {} ({:?}) on rayon: {} -> {} records, {} messages",
            program.name(),
            services.round,
            services.stage,
            result.record_count_in,
            result.record_count_out,
            result.message_count
        );
        Ok(result)
    }
}
