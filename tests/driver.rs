mod util;
use util::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graph_rounds::algs::pagerank::DANGLING;
use graph_rounds::engine::TaskId;
use graph_rounds::prelude::*;

/// Counts rounds in every label and never converges on its own. Fires the
/// cancellation token while emitting round `cancel_at`.
#[derive(Debug)]
struct Ticker {
    cancel: Option<(CancellationToken, usize)>,
}

#[derive(Debug, Clone)]
struct TickProgram {
    cancel: Option<(CancellationToken, usize)>,
}

impl VertexProgram for TickProgram {
    type Label = u64;
    type Payload = ();

    fn name(&self) -> &'static str {
        "tick"
    }

    fn emit(
        &self,
        vertex: &VertexRecord<u64>,
        ctx: &mut TaskContext,
    ) -> Result<Emission<u64, ()>, GraphError> {
        if let Some((token, round)) = &self.cancel {
            if ctx.round() == *round {
                token.cancel();
            }
        }
        let mut next = vertex.clone();
        next.label += 1;
        ctx.mark_dirty();
        Ok(Emission::keep(next))
    }

    fn merge(
        &self,
        _id: &VertexId,
        prior: Option<VertexRecord<u64>>,
        _messages: Vec<()>,
        _ctx: &mut TaskContext,
    ) -> Result<Option<VertexRecord<u64>>, GraphError> {
        Ok(prior)
    }
}

impl Algorithm for Ticker {
    type Label = u64;
    type Program = TickProgram;
    type State = ();

    fn name(&self) -> &'static str {
        "ticker"
    }

    fn max_rounds(&self) -> usize {
        100
    }

    fn validate(&self, _input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError> {
        Ok(())
    }

    fn initialize(&self, _state: &(), _record: &VertexRecord<LabelMap>) -> Result<u64, GraphError> {
        Ok(0)
    }

    fn program(&self, _state: &(), _round: usize) -> TickProgram {
        TickProgram {
            cancel: self.cancel.clone(),
        }
    }
}

/// Refuses every post and every collection.
#[derive(Debug, Default)]
struct Unreachable;

impl AggregationService for Unreachable {
    fn post(&self, _task: &TaskId, channel: &str, _value: f64) -> Result<(), GraphError> {
        Err(GraphError::AggregationUnavailable(format!("post to `{channel}`")))
    }

    fn collect_total(&self) -> Result<AggregateTotals, GraphError> {
        Err(GraphError::AggregationUnavailable("collect".into()))
    }

    fn reset(&self) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Counts posts before handing them to a [`LocalAggregator`].
#[derive(Debug, Default)]
struct Counting {
    inner: LocalAggregator,
    posts: AtomicUsize,
}

impl AggregationService for Counting {
    fn post(&self, task: &TaskId, channel: &str, value: f64) -> Result<(), GraphError> {
        self.posts.fetch_add(1, Ordering::Relaxed);
        self.inner.post(task, channel, value)
    }

    fn collect_total(&self) -> Result<AggregateTotals, GraphError> {
        self.inner.collect_total()
    }

    fn reset(&self) -> Result<(), GraphError> {
        self.inner.reset()
    }
}

fn dangling_graph() -> GraphSnapshot<LabelMap> {
    directed(&[("A", "B"), ("A", "C"), ("B", "A")], 1)
}

#[test]
fn only_input_and_final_snapshot_survive_a_run() {
    let (store, input) = store_with(path_with_spur(2));
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let outcome = driver.run(&Bfs::new(BfsConfig::new("A")), &input).unwrap();
    assert!(outcome.rounds > 1);
    assert!(store.exists(&input));
    assert!(store.exists(&outcome.final_snapshot));
    let mut expected = vec![input.clone(), outcome.final_snapshot.clone()];
    expected.sort();
    assert_eq!(store.live_locations(), expected);

    // the input is untouched and can be run again
    let again = driver.run(&Bfs::new(BfsConfig::new("E")), &input).unwrap();
    assert_ne!(again.final_snapshot, outcome.final_snapshot);
}

#[test]
fn correction_stage_intermediates_are_released() {
    let (store, input) = store_with(dangling_graph());
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let outcome = driver.run(&patient_pagerank(), &input).unwrap();
    assert!(outcome.reports.iter().all(|r| r.corrected));
    assert_eq!(store.len(), 2);
}

#[test]
fn round_bound_yields_not_converged() {
    let (store, input) = store_with(path_with_spur(1));
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new()).with_config(DriverConfig {
        max_rounds: Some(1),
        ..DriverConfig::default()
    });
    let err = driver.run(&Bfs::new(BfsConfig::new("A")), &input).unwrap_err();
    let GraphError::NotConverged {
        max_rounds,
        last_snapshot,
    } = &err
    else {
        panic!("expected NotConverged, got {err:?}");
    };
    assert_eq!(*max_rounds, 1);
    assert_eq!(err.kind(), ErrorKind::NonConvergence);
    // the approximation is still readable
    let partial = store.read::<graph_rounds::algs::bfs::BfsLabel>(last_snapshot).unwrap();
    assert_eq!(graph_rounds::algs::bfs::distances(&partial).len(), 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn algorithm_round_bound_applies_without_override() {
    let config = BfsConfig {
        max_rounds: 2,
        ..BfsConfig::new("A")
    };
    let (store, input) = store_with(path_with_spur(1));
    let driver = IterationDriver::new(store, SerialSubstrate::new());
    let err = driver.run(&Bfs::new(config), &input).unwrap_err();
    assert!(matches!(err, GraphError::NotConverged { max_rounds: 2, .. }));
}

#[test]
fn missing_input_is_a_configuration_error() {
    let store = Arc::new(MemoryStore::new());
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let ghost = Location::new("mem://nowhere");
    let err = driver.run(&Wcc::default(), &ghost).unwrap_err();
    assert_eq!(err, GraphError::MissingSnapshot(ghost));
    assert!(store.is_empty());
}

#[test]
fn unreachable_aggregation_fails_the_round() {
    let (store, input) = store_with(dangling_graph());
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new())
        .with_aggregator(Arc::new(Unreachable));
    let err = driver.run(&patient_pagerank(), &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RoundExecution);
    let GraphError::RoundFailed {
        round,
        last_snapshot,
        source,
    } = &err
    else {
        panic!("expected RoundFailed, got {err:?}");
    };
    assert_eq!(*round, 1);
    assert!(matches!(**source, GraphError::AggregationUnavailable(_)));
    // the initialized snapshot is kept; the half-written output is gone
    assert!(store.exists(last_snapshot));
    let mut expected = vec![input, last_snapshot.clone()];
    expected.sort();
    assert_eq!(store.live_locations(), expected);
}

#[test]
fn re_executed_tasks_post_once_per_task_id() {
    let plain = {
        let (store, input) = store_with(dangling_graph());
        let driver = IterationDriver::new(store, SerialSubstrate::new());
        driver.run(&patient_pagerank(), &input).unwrap()
    };

    let counting = Arc::new(Counting::default());
    let (store, input) = store_with(dangling_graph());
    let driver = IterationDriver::new(store, SerialSubstrate::new().with_task_retries(2))
        .with_aggregator(counting.clone());
    let retried = driver.run(&patient_pagerank(), &input).unwrap();

    // one dangling vertex, one partition, three attempts per task
    assert_eq!(counting.posts.load(Ordering::Relaxed), 3 * retried.rounds);
    assert_eq!(retried.rounds, plain.rounds);
    for (a, b) in retried.reports.iter().zip(&plain.reports) {
        assert_eq!(a.totals.get(DANGLING), b.totals.get(DANGLING));
        assert_eq!(a.counters, b.counters);
    }
}

#[test]
fn cancellation_keeps_the_previous_snapshot() {
    let (store, input) = store_with(path_with_spur(2));
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let ticker = Ticker {
        cancel: Some((driver.cancellation_token(), 3)),
    };
    let err = driver.run(&ticker, &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    let last = err.last_snapshot().expect("previous round kept").clone();
    let kept = store.read::<u64>(&last).unwrap();
    // rounds 1 and 2 finished
    assert!(kept.records().all(|r| r.label == 2));
    let mut expected = vec![input, last];
    expected.sort();
    assert_eq!(store.live_locations(), expected);
}

#[test]
fn cancelled_before_the_first_round() {
    let (store, input) = store_with(path_with_spur(1));
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    driver.cancellation_token().cancel();
    let err = driver.run(&Ticker { cancel: None }, &input).unwrap_err();
    assert_eq!(
        err,
        GraphError::Cancelled {
            last_snapshot: None
        }
    );
    assert_eq!(store.live_locations(), vec![input]);
}

#[test]
fn invalid_driver_config_is_rejected() {
    let (store, input) = store_with(path_with_spur(1));
    let driver = IterationDriver::new(store, SerialSubstrate::new()).with_config(DriverConfig {
        max_rounds: Some(0),
        ..DriverConfig::default()
    });
    let err = driver.run(&Wcc::default(), &input).unwrap_err();
    assert!(matches!(err, GraphError::InvalidConfig(_)));
}

#[test]
fn runs_against_the_file_store() {
    let root = std::env::temp_dir().join(format!("graph-rounds-driver-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let store = Arc::new(FileStore::open(&root).unwrap());
    let input = store.put(path_with_spur(3)).unwrap();
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let outcome = driver.run(&Bfs::new(BfsConfig::new("A")), &input).unwrap();
    let result = store
        .read::<graph_rounds::algs::bfs::BfsLabel>(&outcome.final_snapshot)
        .unwrap();
    assert_eq!(graph_rounds::algs::bfs::distances(&result)["E"], 4);
    let files = std::fs::read_dir(&root).unwrap().count();
    assert_eq!(files, 2);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn non_finite_input_weight_fails_before_the_first_round() {
    let mut a = VertexRecord::new("a", LabelMap::new());
    let mut b = VertexRecord::new("b", LabelMap::new());
    a.out_edges.insert(VertexId::from("b"), f64::NAN);
    b.in_edges.insert(VertexId::from("a"), f64::NAN);
    let graph = GraphSnapshot::from_records(graph_rounds::partitioning::HashPartitioner::new(2), [a, b])
        .unwrap();
    let (store, input) = store_with(graph);
    let driver = IterationDriver::new(store.clone(), SerialSubstrate::new());
    let err = driver.run(&Wcc::default(), &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, GraphError::InvalidConfig(ref msg) if msg.contains("non-finite")));
    assert_eq!(store.live_locations(), vec![input]);
}
