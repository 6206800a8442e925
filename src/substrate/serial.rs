//! Single-threaded reference substrate.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::engine::counters::RoundCounters;
use crate::engine::program::VertexProgram;
use crate::engine::signal::ConvergenceSignal;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph::vertex_id::VertexId;
use crate::graph_error::GraphError;
use crate::storage::{Location, SnapshotStore};
use crate::substrate::{
    Groups, Mailbox, RoundResult, RoundServices, Substrate, check_cancelled, emit_task,
    merge_task, run_task,
};

/// Runs partitions one after another on the calling thread.
///
/// ```
/// use graph_rounds::substrate::SerialSubstrate;
/// let substrate = SerialSubstrate::new().with_shuffle(7).with_task_retries(1);
/// assert_eq!(substrate.task_retries(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SerialSubstrate {
    shuffle_seed: Option<u64>,
    task_retries: usize,
}

impl SerialSubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permutes every destination's message list with a `SmallRng` seeded
    /// from `seed`, the round number and the partition.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Executes every task `1 + retries` times. Side effects of all attempts
    /// are published; the output of the last attempt is kept.
    pub fn with_task_retries(mut self, retries: usize) -> Self {
        self.task_retries = retries;
        self
    }

    pub fn task_retries(&self) -> usize {
        self.task_retries
    }
}

/// Shuffles message lists in id order so the permutation only depends on the seed.
pub(crate) fn permute_messages<L, P>(groups: &mut Groups<L, P>, seed: u64, round: usize, part: usize) {
    let mut rng = SmallRng::seed_from_u64(
        seed ^ (round as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ (part as u64).rotate_left(32),
    );
    let mut ids: Vec<VertexId> = groups.keys().cloned().collect();
    ids.sort_unstable();
    for id in ids {
        if let Some(group) = groups.get_mut(&id) {
            group.messages.shuffle(&mut rng);
        }
    }
}

impl Substrate for SerialSubstrate {
    fn name(&self) -> &'static str {
        "serial"
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
        let mut counters = RoundCounters::new();
        let mut message_count = 0;

        for part in 0..n_parts {
            let (batch, task_counters) = run_task(self.task_retries, services, &signal, || {
                emit_task(program, services, part, snapshot.partition(part), &partitioner)
            })?;
            message_count += batch.messages;
            counters.absorb(&task_counters);
            mailbox.post(part, batch.outbound)?;
        }

        // barrier between emit and merge
        check_cancelled(services)?;

        let mut partitions = Vec::with_capacity(n_parts);
        for part in 0..n_parts {
            let mut groups = mailbox.collect::<P::Label, P::Payload>(part, n_parts)?;
            if let Some(seed) = self.shuffle_seed {
                permute_messages(&mut groups, seed, services.round, part);
            }
            let retries = self.task_retries;
            let mut attempt = 0;
            let (merged, task_counters) = run_task(retries, services, &signal, || {
                attempt += 1;
                let groups = if attempt > retries {
                    std::mem::take(&mut groups)
                } else {
                    groups.clone()
                };
                merge_task(program, services, part, groups)
            })?;
            counters.absorb(&task_counters);
            partitions.push(merged);
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
            "{} round {} ({:?}): {} -> {} records, {} messages, signal {}",
            program.name(),
            services.round,
            services.stage,
            result.record_count_in,
            result.record_count_out,
            result.message_count,
            result.signal_raised
        );
        Ok(result)
    }
}
