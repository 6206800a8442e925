//! The iterative vertex-centric round engine.
//!
//! - [`program`]: the `emit`/`merge` contract algorithms implement
//! - [`context`]: per-task side channels (signal, aggregates, counters)
//! - [`signal`]: the per-partition, OR-reduced convergence signal
//! - [`aggregate`]: the task-id-deduplicated aggregation service
//! - [`wire`]: frames for shuffle batches
//! - [`driver`]: the round loop and snapshot lifecycle

pub mod aggregate;
pub mod context;
pub mod counters;
pub mod driver;
pub mod program;
pub mod signal;
pub mod wire;

pub use aggregate::{AggregateTotals, AggregationService, LocalAggregator};
pub use context::{CancellationToken, Stage, TaskContext, TaskId, TaskPhase};
pub use counters::RoundCounters;
pub use driver::{
    Algorithm, DriverConfig, DriverState, IterationDriver, RoundReport, RunOutcome, Verdict,
};
pub use program::{Emission, Message, Payload, VertexProgram, ordered_sum};
pub use signal::ConvergenceSignal;
