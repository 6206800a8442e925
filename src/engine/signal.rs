//! Convergence signal of one round stage.
//!
//! One flag per partition. A task that changed something raises its
//! partition's flag; the driver reads the OR of all flags once every task of
//! the stage has finished. A fresh signal is created for every stage, so
//! there is nothing to reset.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::partitioning::PartitionId;

#[derive(Debug)]
pub struct ConvergenceSignal {
    flags: Vec<AtomicBool>,
}

impl ConvergenceSignal {
    pub fn new(n_parts: usize) -> Self {
        Self {
            flags: (0..n_parts.max(1)).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Raises the flag of `partition`. Raising an already raised flag is a
    /// no-op, so retried tasks cannot double-count.
    pub fn raise(&self, partition: PartitionId) {
        let flag = &self.flags[partition % self.flags.len()];
        if !flag.load(Ordering::Acquire) {
            flag.store(true, Ordering::Release);
        }
    }

    /// OR over all partitions.
    pub fn is_raised(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::Acquire))
    }

    pub fn raised_partitions(&self) -> usize {
        self.flags
            .iter()
            .filter(|f| f.load(Ordering::Acquire))
            .count()
    }
}
