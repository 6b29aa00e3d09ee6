//! Exhaustive NC × KC sweeps over an external benchmark binary.

pub mod grid;
pub mod orchestrator;
pub mod runner;

pub use grid::{ParameterGrid, ParameterPoint};
pub use orchestrator::{FailedInvocation, SweepLog, SweepOrchestrator, SweepSummary};
pub use runner::{
    ExecutionOutcome, ExitState, ExternalRunner, InvocationEnv, ProcessRunner, SweepTask,
};
