//! Per-round global sums keyed by channel.
//!
//! Tasks post one partial per channel when they finish. Posts are keyed by
//! [`TaskId`], and only the first post of a task id counts, so a task that a
//! substrate re-executes after a failure cannot inflate a total.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::engine::context::TaskId;
use crate::engine::program::ordered_sum;
use crate::graph_error::GraphError;

/// Totals of one round stage, one value per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTotals {
    totals: BTreeMap<String, f64>,
}

impl AggregateTotals {
    /// Total of `channel`; channels nobody posted to read as `0.0`.
    pub fn get(&self, channel: &str) -> f64 {
        self.totals.get(channel).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.totals.contains_key(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

impl FromIterator<(String, f64)> for AggregateTotals {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            totals: iter.into_iter().collect(),
        }
    }
}

/// Sink for task partials, read back by the driver between stages.
pub trait AggregationService: Send + Sync {
    /// Records `value` for `channel` on behalf of `task`. A second post with
    /// the same task id and channel is ignored.
    fn post(&self, task: &TaskId, channel: &str, value: f64) -> Result<(), GraphError>;

    /// Sums everything posted since the last [`reset`](Self::reset).
    fn collect_total(&self) -> Result<AggregateTotals, GraphError>;

    /// Forgets all posts. Called before each stage.
    fn reset(&self) -> Result<(), GraphError>;
}

/// In-process aggregation service.
#[derive(Debug, Default)]
pub struct LocalAggregator {
    posts: Mutex<HashMap<String, HashMap<TaskId, f64>>>,
}

impl LocalAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AggregationService for LocalAggregator {
    fn post(&self, task: &TaskId, channel: &str, value: f64) -> Result<(), GraphError> {
        let mut posts = self.posts.lock();
        let channel_posts = posts.entry(channel.to_string()).or_default();
        if channel_posts.contains_key(task) {
            log::debug!("ignoring repeated post from {task} on `{channel}`");
            return Ok(());
        }
        channel_posts.insert(*task, value);
        Ok(())
    }

    fn collect_total(&self) -> Result<AggregateTotals, GraphError> {
        let posts = self.posts.lock();
        Ok(posts
            .iter()
            .map(|(channel, by_task)| {
                (channel.clone(), ordered_sum(by_task.values().copied().collect()))
            })
            .collect())
    }

    fn reset(&self) -> Result<(), GraphError> {
        self.posts.lock().clear();
        Ok(())
    }
}
