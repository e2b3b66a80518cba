//! Simulated agent actions for the automatic phases.
//!
//! Each automatic phase is planned as an explicit [`PhaseRun`] task list.
//! [`Simulator::step`] executes one task at a time so the caller can persist
//! and render between tasks. Every sub-step appends a `running` log entry,
//! waits, then settles that entry to `success` or `error`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::log::LogStatus;
use super::notes::draft_case_notes;
use super::phase::{ClaimOutcome, Phase, Transition};
use super::state::WorkflowState;
use crate::fixtures::retrieved_documents;

const UPLOAD_MS: u64 = 2000;
const RETRY_PAUSE_MS: u64 = 1500;
const UPLOADING: &str = "Uploading merged documentation...";
const SUBMITTED: &str = "Documentation submitted successfully to payer portal.";

/// How simulated delays are realised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Sleep for the scripted duration multiplied by `scale`.
    Realtime { scale: f64 },
    /// Skip all delays.
    Instant,
}

impl Pacing {
    pub async fn wait(&self, ms: u64) {
        if let Pacing::Realtime { scale } = *self {
            let scaled = (ms as f64 * scale.max(0.0)) as u64;
            if scaled > 0 {
                sleep(Duration::from_millis(scaled)).await;
            }
        }
    }
}

/// Decides whether a payer-portal upload attempt fails.
pub trait FailureInjector: Send {
    /// `attempt` is 1-based.
    fn should_fail(&mut self, attempt: u32) -> bool;
}

/// Fails attempt `n` with probability `probabilities[n - 1]`. Attempts past
/// the end of the list reuse the last probability.
pub struct RandomFailures {
    probabilities: Vec<f64>,
    rng: StdRng,
}

impl RandomFailures {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self {
            probabilities,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(probabilities: Vec<f64>, seed: u64) -> Self {
        Self {
            probabilities,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn probability(&self, attempt: u32) -> f64 {
        let idx = attempt.saturating_sub(1) as usize;
        let p = self
            .probabilities
            .get(idx)
            .or(self.probabilities.last())
            .copied()
            .unwrap_or(0.0);
        if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
    }
}

impl FailureInjector for RandomFailures {
    fn should_fail(&mut self, attempt: u32) -> bool {
        let p = self.probability(attempt);
        self.rng.random_bool(p)
    }
}

/// Cooperative cancellation flag shared between the runner and whoever
/// wants to stop it. Checked before every task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn push_step(tasks: &mut VecDeque<Task>, message: String, ms: u64) {
    tasks.push_back(Task::Begin(message));
    tasks.push_back(Task::Settle(ms));
}

#[derive(Debug, Clone, PartialEq)]
enum Task {
    /// Append a `running` entry.
    Begin(String),
    /// Wait, then mark the last entry `success`.
    Settle(u64),
    Pause(u64),
    /// Wait, then settle the pending upload entry according to the
    /// failure injector.
    Upload { attempt: u32 },
    InstallDocuments,
    RecordMerge,
    DraftCaseNotes,
    Advance(Phase),
}

/// The remaining task list of one automatic phase.
#[derive(Debug, Clone)]
pub struct PhaseRun {
    phase: Phase,
    tasks: VecDeque<Task>,
}

impl PhaseRun {
    /// Plans the task list for the state's current phase, or `None` when the
    /// phase waits for a human.
    pub fn plan(state: &WorkflowState) -> Option<Self> {
        let phase = state.phase();
        let mut tasks = VecDeque::new();

        match phase {
            Phase::NbaProcessing => {
                let (carc, rarc) = state
                    .claim()
                    .map(|c| (c.carc_code.as_str(), c.rarc_code.as_str()))
                    .unwrap_or(("-", "-"));
                push_step(&mut tasks, "Retrieving claim information from database...".into(), 1200);
                push_step(&mut tasks, "Identifying denial codes...".into(), 1000);
                push_step(&mut tasks, format!("Found CARC: {carc}, RARC: {rarc}"), 800);
                push_step(&mut tasks, "Analyzing denial reason...".into(), 1500);
                push_step(&mut tasks, "Retrieving recommended resolution steps...".into(), 1500);
                push_step(&mut tasks, "Analysis complete. Summary ready for review.".into(), 0);
                tasks.push_back(Task::Advance(Phase::NbaApproval));
            }
            Phase::ActionRetrievingDocs => {
                push_step(&mut tasks, "Navigating to Documents tab in PMS portal...".into(), 1000);
                push_step(&mut tasks, "Accessing Chart Notes section...".into(), 1200);
                push_step(&mut tasks, "Accessing Delivery Ticket section...".into(), 1000);
                push_step(&mut tasks, "Searching for documents relevant to claim denial...".into(), 1500);
                push_step(
                    &mut tasks,
                    format!("Found {} documents. Ready for review.", retrieved_documents().len()),
                    0,
                );
                tasks.push_back(Task::InstallDocuments);
                tasks.push_back(Task::Advance(Phase::DocReview));
            }
            Phase::ActionMerging => {
                let count = state.selected_document_ids().len();
                push_step(&mut tasks, "Downloading selected documents...".into(), 1500);
                push_step(&mut tasks, format!("Merging {count} documents into single PDF..."), 2000);
                push_step(&mut tasks, "Merged PDF created successfully.".into(), 0);
                tasks.push_back(Task::RecordMerge);
                tasks.push_back(Task::Advance(Phase::MergeReview));
            }
            Phase::ActionSubmitting => {
                // A resumed submission whose upload was accepted picks up after it.
                if !state.upload_confirmed() {
                    push_step(&mut tasks, "Connecting to payer portal...".into(), 1000);
                    tasks.push_back(Task::Begin(UPLOADING.into()));
                    tasks.push_back(Task::Upload {
                        attempt: state.retry_count() + 1,
                    });
                }
                push_step(&mut tasks, "Taking Case ID snapshot as proof of submission...".into(), 1000);
                push_step(&mut tasks, "Navigating to PMS portal...".into(), 800);
                push_step(
                    &mut tasks,
                    "Uploading merged PDF and Case ID snapshot to Documents tab under Appeals category..."
                        .into(),
                    1500,
                );
                push_step(&mut tasks, "Generating summary and case notes for review...".into(), 1200);
                tasks.push_back(Task::DraftCaseNotes);
                tasks.push_back(Task::Advance(Phase::CaseNotes));
            }
            _ => return None,
        }

        Some(Self { phase, tasks })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> usize {
        self.tasks.len()
    }
}

/// Result of executing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finished(Transition),
    Cancelled,
}

/// Executes [`PhaseRun`]s against a workflow state.
pub struct Simulator {
    pacing: Pacing,
    failures: Box<dyn FailureInjector>,
    max_attempts: u32,
    cancel: CancelToken,
}

impl Simulator {
    pub fn new(pacing: Pacing, failures: Box<dyn FailureInjector>, max_attempts: u32) -> Self {
        Self {
            pacing,
            failures,
            max_attempts: max_attempts.max(1),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the next task of `run`.
    ///
    /// Returns `Cancelled` without touching `state` when the cancel token is
    /// set or when the state has already left the run's phase.
    pub async fn step(&mut self, run: &mut PhaseRun, state: &mut WorkflowState) -> StepOutcome {
        if self.cancel.is_cancelled() {
            info!(phase = %run.phase, "simulation cancelled");
            return StepOutcome::Cancelled;
        }
        if state.phase() != run.phase {
            warn!(expected = %run.phase, actual = %state.phase(), "stale phase run dropped");
            return StepOutcome::Cancelled;
        }
        let Some(task) = run.tasks.pop_front() else {
            return StepOutcome::Finished(Transition::Stay);
        };

        match task {
            Task::Begin(message) => {
                debug!(phase = %run.phase, message = message.as_str(), "sub-step started");
                state.log_mut().append(message);
            }
            Task::Settle(ms) => {
                self.pacing.wait(ms).await;
                state.log_mut().set_last_status(LogStatus::Success);
            }
            Task::Pause(ms) => self.pacing.wait(ms).await,
            Task::Upload { attempt } => {
                self.pacing.wait(UPLOAD_MS).await;
                if !self.failures.should_fail(attempt) {
                    let log = state.log_mut();
                    log.set_last_status(LogStatus::Success);
                    log.append_with_status(SUBMITTED, LogStatus::Success);
                    state.confirm_upload();
                    info!(attempt, "payer accepted the upload");
                    return StepOutcome::Continue;
                }

                state.log_mut().set_last_status(LogStatus::Error);
                if attempt < self.max_attempts {
                    let retries = state.bump_retry();
                    warn!(attempt, retries, "payer upload failed, retrying");
                    run.tasks.push_front(Task::Upload {
                        attempt: attempt + 1,
                    });
                    run.tasks.push_front(Task::Begin(format!(
                        "Submission failed. Retry attempt {retries}: uploading merged documentation..."
                    )));
                    run.tasks.push_front(Task::Pause(RETRY_PAUSE_MS));
                } else {
                    warn!(attempt, "payer upload failed on final attempt, escalating");
                    state
                        .log_mut()
                        .append_with_status("Retry failed. Reverting to manual flow.", LogStatus::Success);
                    state.enter(Phase::ManualFlow);
                    run.tasks.clear();
                    return StepOutcome::Finished(Transition::Complete(ClaimOutcome::Manual));
                }
            }
            Task::InstallDocuments => state.install_documents(retrieved_documents()),
            Task::RecordMerge => {
                let claim_id = state.claim().map(|c| c.claim_id.clone()).unwrap_or_default();
                state.set_merged_artifact(format!("merged://{claim_id}/{}.pdf", Uuid::new_v4()));
            }
            Task::DraftCaseNotes => {
                let notes = draft_case_notes(state);
                state.set_case_notes(notes);
            }
            Task::Advance(next) => {
                state.enter(next);
                info!(from = %run.phase, to = %next, "automatic phase finished");
                return StepOutcome::Finished(Transition::into_phase(next));
            }
        }

        StepOutcome::Continue
    }
}

/// Replays a fixed sequence of failure decisions; missing entries succeed.
#[cfg(test)]
pub(crate) struct ScriptedFailures(pub VecDeque<bool>);

#[cfg(test)]
impl ScriptedFailures {
    pub(crate) fn boxed(script: &[bool]) -> Box<dyn FailureInjector> {
        Box::new(Self(script.iter().copied().collect()))
    }
}

#[cfg(test)]
impl FailureInjector for ScriptedFailures {
    fn should_fail(&mut self, _attempt: u32) -> bool {
        self.0.pop_front().unwrap_or(false)
    }
}
