mod log;
mod notes;
mod phase;
mod simulation;
mod state;

pub use log::{LogEntry, LogStatus};
pub use phase::{ClaimOutcome, Phase, WorkflowAction, WorkflowMachine};
pub use simulation::{CancelToken, Pacing, PhaseRun, RandomFailures, Simulator, StepOutcome};
pub use state::{Document, WorkflowState};

#[cfg(test)]
pub(crate) use log::ActivityLog;
#[cfg(test)]
pub(crate) use simulation::ScriptedFailures;
