//! Named per-round counters.
//!
//! Each task counts into its own [`RoundCounters`]; the substrate folds the
//! task-local maps into one per round, the same fold/reduce shape the
//! parallel iterators use.

use std::collections::BTreeMap;

/// Sum of named `u64` counters. Missing names read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundCounters {
    values: BTreeMap<String, u64>,
}

impl RoundCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &str, by: u64) {
        if let Some(v) = self.values.get_mut(name) {
            *v += by;
        } else {
            self.values.insert(name.to_string(), by);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    /// Adds every counter of `other` into `self`.
    pub fn absorb(&mut self, other: &RoundCounters) {
        for (name, v) in &other.values {
            self.increment(name, *v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
