//! Per-task execution context handed to `emit` and `merge`.
//!
//! A task is one partition's worth of `emit` calls, or one partition's worth
//! of `merge` calls, within one stage of one round. All side effects an
//! algorithm may have go through the task's context: raising the convergence
//! signal, posting to the aggregation service, bumping counters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::engine::counters::RoundCounters;
use crate::partitioning::PartitionId;

/// Which invocation of a round a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// The round proper.
    Main,
    /// The optional correction micro-round over the main round's output.
    Correction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPhase {
    Emit,
    Merge,
}

/// Identity of one task. A re-executed task gets the same id, which is what
/// makes aggregate posts idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub round: usize,
    pub stage: Stage,
    pub phase: TaskPhase,
    pub partition: PartitionId,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            Stage::Main => "main",
            Stage::Correction => "correction",
        };
        let phase = match self.phase {
            TaskPhase::Emit => "emit",
            TaskPhase::Merge => "merge",
        };
        write!(
            f,
            "r{:04}/{stage}/{phase}/p{:03}",
            self.round, self.partition
        )
    }
}

/// Mutable side-channel state of one running task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task: TaskId,
    dirty: bool,
    aggregates: BTreeMap<String, f64>,
    counters: RoundCounters,
}

impl TaskContext {
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            dirty: false,
            aggregates: BTreeMap::new(),
            counters: RoundCounters::new(),
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Number of the running round; the first round is 1.
    pub fn round(&self) -> usize {
        self.task.round
    }

    pub fn stage(&self) -> Stage {
        self.task.stage
    }

    /// Raises this task's convergence flag. Calling it again is a no-op.
    pub fn mark_dirty(&mut self) {
        if !self.dirty {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Adds `value` to this task's partial for `channel`.
    ///
    /// The partial is posted to the aggregation service once, when the task
    /// finishes.
    pub fn post_aggregate(&mut self, channel: &str, value: f64) {
        *self.aggregates.entry(channel.to_string()).or_insert(0.0) += value;
    }

    pub fn increment(&mut self, counter: &str, by: u64) {
        self.counters.increment(counter, by);
    }

    /// Splits the context into what the substrate reports after the task.
    pub(crate) fn finish(self) -> TaskOutcome {
        TaskOutcome {
            task: self.task,
            dirty: self.dirty,
            aggregates: self.aggregates,
            counters: self.counters,
        }
    }
}

/// Side effects of a finished task, ready to be published.
#[derive(Debug, Clone)]
pub(crate) struct TaskOutcome {
    pub task: TaskId,
    pub dirty: bool,
    pub aggregates: BTreeMap<String, f64>,
    pub counters: RoundCounters,
}

/// Cooperative cancellation shared between a driver and its substrate.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
