//! The iteration driver: rounds, convergence and snapshot lifecycle.
//!
//! ```text
//! Init -> RunningRound -> [RunningCorrectionRound] -> CheckingConvergence
//!                ^                                          |
//!                +------------------------------------------+
//!                                                           v
//!                                            Finalizing -> Done
//! ```
//!
//! Between rounds the driver owns exactly one live snapshot besides the
//! caller's input: the newest one. Every superseded intermediate is deleted
//! as soon as its successor is written, and a failed or cancelled stage
//! deletes its own unwritten output.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::engine::aggregate::{AggregateTotals, AggregationService, LocalAggregator};
use crate::engine::context::{CancellationToken, Stage};
use crate::engine::counters::RoundCounters;
use crate::engine::program::VertexProgram;
use crate::graph::labels::{Label, LabelMap};
use crate::graph::record::VertexRecord;
use crate::graph::snapshot::GraphSnapshot;
use crate::graph_error::GraphError;
use crate::partitioning::partition_stats;
use crate::storage::{Location, SnapshotStore};
use crate::substrate::{RoundResult, RoundServices, Substrate};

/// Outcome of the convergence check after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Converged,
}

/// Everything the driver learned about one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    /// Round number, starting at 1.
    pub round: usize,
    pub record_count_in: usize,
    pub record_count_out: usize,
    pub message_count: usize,
    /// Signal of the round; a correction stage's signal replaces the main one.
    pub signal_raised: bool,
    /// Aggregate totals of the main stage.
    pub totals: AggregateTotals,
    /// Counters of the main stage plus those of the correction stage.
    pub counters: RoundCounters,
    pub corrected: bool,
}

/// One graph algorithm as seen by the driver.
///
/// The driver converts the raw [`LabelMap`] input with [`initialize`],
/// then asks for a [`program`] each round, an optional [`correction`] after
/// the main stage, and a [`Verdict`] from [`advance`].
///
/// [`initialize`]: Algorithm::initialize
/// [`program`]: Algorithm::program
/// [`correction`]: Algorithm::correction
/// [`advance`]: Algorithm::advance
pub trait Algorithm: Sync {
    type Label: Label;
    type Program: VertexProgram<Label = Self::Label>;
    /// Driver-side state carried between rounds (phase, round counters, ...).
    type State: Default + Debug + Send;

    fn name(&self) -> &'static str;

    /// Upper bound on the number of rounds.
    fn max_rounds(&self) -> usize;

    /// Checks the configuration against the input graph. Runs before any round.
    fn validate(&self, input: &GraphSnapshot<LabelMap>) -> Result<(), GraphError>;

    fn initial_state(&self, _input: &GraphSnapshot<LabelMap>) -> Self::State {
        Self::State::default()
    }

    /// Converts one raw input record into the algorithm's label.
    fn initialize(
        &self,
        state: &Self::State,
        record: &VertexRecord<LabelMap>,
    ) -> Result<Self::Label, GraphError>;

    /// Program for the main stage of `round`.
    fn program(&self, state: &Self::State, round: usize) -> Self::Program;

    /// Program for a correction stage, given the main stage's totals.
    fn correction(&self, _state: &Self::State, _totals: &AggregateTotals) -> Option<Self::Program> {
        None
    }

    /// Decides whether to run another round. Defaults to the round's signal.
    fn advance(&self, _state: &mut Self::State, report: &RoundReport) -> Result<Verdict, GraphError> {
        Ok(if report.signal_raised {
            Verdict::Continue
        } else {
            Verdict::Converged
        })
    }
}

/// Driver-level knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Overrides the algorithm's own round bound.
    pub max_rounds: Option<usize>,
    /// Logs per-partition record counts and edge cut at `Init`.
    pub log_partition_stats: bool,
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.max_rounds == Some(0) {
            return Err(GraphError::InvalidConfig(
                "max_rounds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    RunningRound,
    RunningCorrectionRound,
    CheckingConvergence,
    Finalizing,
    Done,
}

/// Result of a converged run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// The only snapshot the run leaves behind.
    pub final_snapshot: Location,
    pub rounds: usize,
    pub reports: Vec<RoundReport>,
}

/// Runs [`Algorithm`]s over snapshots held in a [`SnapshotStore`].
pub struct IterationDriver<S, B> {
    store: Arc<S>,
    substrate: B,
    aggregator: Arc<dyn AggregationService>,
    cancel: CancellationToken,
    config: DriverConfig,
}

impl<S, B> Debug for IterationDriver<S, B>
where
    B: Substrate,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationDriver")
            .field("substrate", &self.substrate.name())
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<S, B> IterationDriver<S, B>
where
    S: SnapshotStore,
    B: Substrate,
{
    /// Creates a driver with an in-process [`LocalAggregator`].
    pub fn new(store: Arc<S>, substrate: B) -> Self {
        Self {
            store,
            substrate,
            aggregator: Arc::new(LocalAggregator::new()),
            cancel: CancellationToken::new(),
            config: DriverConfig::default(),
        }
    }

    pub fn with_aggregator(mut self, aggregator: Arc<dyn AggregationService>) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Token that cancels runs of this driver when fired.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs `algorithm` to convergence starting from the raw graph at `input`.
    ///
    /// The input snapshot is never modified or deleted. On success only the
    /// returned final snapshot remains besides it. On
    /// [`GraphError::NotConverged`], [`GraphError::RoundFailed`] and
    /// [`GraphError::Cancelled`] the newest valid snapshot is kept and named
    /// in the error.
    pub fn run<A: Algorithm>(&self, algorithm: &A, input: &Location) -> Result<RunOutcome, GraphError> {
        let mut state = DriverState::Init;
        log::info!("{}: starting from `{input}`", algorithm.name());

        self.config.validate()?;
        if !self.store.exists(input) {
            return Err(GraphError::MissingSnapshot(input.clone()));
        }
        let raw = self.store.read::<LabelMap>(input)?;
        raw.validate_invariants()
            .map_err(|e| GraphError::InvalidConfig(format!("input `{input}`: {e}")))?;
        algorithm.validate(&raw)?;
        let mut alg_state = algorithm.initial_state(&raw);
        let converted = raw.map_labels(|record| algorithm.initialize(&alg_state, record))?;
        converted.debug_assert_invariants();
        if self.config.log_partition_stats {
            let stats = partition_stats(&converted);
            log::info!(
                "{}: {} partitions, records {:?}, edge cut {}/{} (imbalance {:.2})",
                algorithm.name(),
                stats.records.len(),
                stats.records,
                stats.edge_cut,
                stats.edges,
                stats.imbalance()
            );
        }
        drop(raw);
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled {
                last_snapshot: None,
            });
        }
        let mut current = self.store.put(converted)?;

        let max_rounds = self.config.max_rounds.unwrap_or_else(|| algorithm.max_rounds());
        let mut reports = Vec::new();
        let mut round = 0;
        loop {
            round += 1;
            self.transition(&mut state, DriverState::RunningRound, round);
            let program = algorithm.program(&alg_state, round);
            let (next, main, totals) = self.run_stage(&program, &current, round, Stage::Main)?;
            self.retire(&current, input);
            current = next;

            let mut report = RoundReport {
                round,
                record_count_in: main.record_count_in,
                record_count_out: main.record_count_out,
                message_count: main.message_count,
                signal_raised: main.signal_raised,
                totals,
                counters: main.counters,
                corrected: false,
            };

            if let Some(correction) = algorithm.correction(&alg_state, &report.totals) {
                self.transition(&mut state, DriverState::RunningCorrectionRound, round);
                let (next, fixed, _) =
                    self.run_stage(&correction, &current, round, Stage::Correction)?;
                self.retire(&current, input);
                current = next;
                report.signal_raised = fixed.signal_raised;
                report.message_count += fixed.message_count;
                report.record_count_out = fixed.record_count_out;
                report.counters.absorb(&fixed.counters);
                report.corrected = true;
            }

            self.transition(&mut state, DriverState::CheckingConvergence, round);
            let verdict = algorithm
                .advance(&mut alg_state, &report)
                .map_err(|e| GraphError::RoundFailed {
                    round,
                    last_snapshot: current.clone(),
                    source: Box::new(e),
                })?;
            reports.push(report);

            match verdict {
                Verdict::Converged => break,
                Verdict::Continue if round >= max_rounds => {
                    log::warn!(
                        "{}: no convergence after {max_rounds} rounds; keeping `{current}`",
                        algorithm.name()
                    );
                    return Err(GraphError::NotConverged {
                        max_rounds,
                        last_snapshot: current,
                    });
                }
                Verdict::Continue => {
                    if self.cancel.is_cancelled() {
                        return Err(GraphError::Cancelled {
                            last_snapshot: Some(current),
                        });
                    }
                }
            }
        }

        self.transition(&mut state, DriverState::Finalizing, round);
        log::info!(
            "{}: converged after {round} rounds; final snapshot `{current}`",
            algorithm.name()
        );
        self.transition(&mut state, DriverState::Done, round);
        Ok(RunOutcome {
            final_snapshot: current,
            rounds: round,
            reports,
        })
    }

    fn transition(&self, state: &mut DriverState, next: DriverState, round: usize) {
        log::debug!("round {round}: {state:?} -> {next:?}");
        *state = next;
    }

    /// Runs one stage into a fresh location. On failure the fresh location is
    /// released and `input` stays the newest valid snapshot.
    fn run_stage<P: VertexProgram>(
        &self,
        program: &P,
        input: &Location,
        round: usize,
        stage: Stage,
    ) -> Result<(Location, RoundResult, AggregateTotals), GraphError> {
        let failed = |source: GraphError| match source {
            GraphError::Cancelled { .. } => GraphError::Cancelled {
                last_snapshot: Some(input.clone()),
            },
            source => GraphError::RoundFailed {
                round,
                last_snapshot: input.clone(),
                source: Box::new(source),
            },
        };
        self.aggregator.reset().map_err(failed)?;
        let output = self.store.allocate().map_err(failed)?;
        let services = RoundServices {
            round,
            stage,
            aggregator: self.aggregator.as_ref(),
            cancel: &self.cancel,
        };
        let outcome = self
            .substrate
            .run_round(program, self.store.as_ref(), input, &output, &services)
            .and_then(|result| Ok((result, self.aggregator.collect_total()?)));
        match outcome {
            Ok((result, totals)) => Ok((output, result, totals)),
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&output) {
                    log::warn!("could not release `{output}` after a failed stage: {cleanup}");
                }
                Err(failed(e))
            }
        }
    }

    /// Deletes a superseded intermediate. The caller's input is never deleted.
    fn retire(&self, superseded: &Location, input: &Location) {
        if superseded == input {
            return;
        }
        if let Err(e) = self.store.delete(superseded) {
            log::warn!("could not delete superseded snapshot `{superseded}`: {e}");
        }
    }
}
