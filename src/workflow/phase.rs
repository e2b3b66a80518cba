use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::log::LogStatus;
use super::state::WorkflowState;
use crate::error::SessionError;

/// The phases of a claim resolution workflow.
///
/// Happy path: NBA_PROCESSING → NBA_APPROVAL → RETRIEVING_DOCS → DOC_REVIEW →
/// MERGING → MERGE_REVIEW → SUBMITTING → CASE_NOTES → COMPLETED.
/// `ManualFlow` is the second terminal phase, reached whenever the claim is
/// handed back to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    NbaProcessing,
    NbaApproval,
    ActionRetrievingDocs,
    DocReview,
    Smartsheets,
    ActionMerging,
    MergeReview,
    ActionSubmitting,
    CaseNotes,
    Completed,
    ManualFlow,
}

impl Phase {
    /// Phases that run a simulated sub-step sequence and advance on their own.
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            Phase::NbaProcessing
                | Phase::ActionRetrievingDocs
                | Phase::ActionMerging
                | Phase::ActionSubmitting
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::ManualFlow)
    }

    /// Short human label used by the progress display.
    pub fn title(self) -> &'static str {
        match self {
            Phase::NbaProcessing => "Analyzing claim",
            Phase::NbaApproval => "Review resolution steps",
            Phase::ActionRetrievingDocs => "Retrieving documents",
            Phase::DocReview => "Review documents",
            Phase::Smartsheets => "Client communication",
            Phase::ActionMerging => "Merging documents",
            Phase::MergeReview => "Review merged PDF",
            Phase::ActionSubmitting => "Submitting to payer",
            Phase::CaseNotes => "Case notes",
            Phase::Completed => "Completed",
            Phase::ManualFlow => "Manual flow",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NbaProcessing => "nba-processing",
            Phase::NbaApproval => "nba-approval",
            Phase::ActionRetrievingDocs => "action-retrieving-docs",
            Phase::DocReview => "doc-review",
            Phase::Smartsheets => "smartsheets",
            Phase::ActionMerging => "action-merging",
            Phase::MergeReview => "merge-review",
            Phase::ActionSubmitting => "action-submitting",
            Phase::CaseNotes => "case-notes",
            Phase::Completed => "completed",
            Phase::ManualFlow => "manual-flow",
        };
        f.write_str(name)
    }
}

/// A human decision at one of the workflow checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowAction {
    Approve,
    Reject,
    ToggleDocument(String),
    SelectAll,
    ConfirmDocuments,
    MarkNotRelevant,
    ReturnFromSmartsheets,
    EscalateToManual,
    SubmitCaseNotes(String),
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::ToggleDocument(_) => "toggle",
            WorkflowAction::SelectAll => "select-all",
            WorkflowAction::ConfirmDocuments => "confirm",
            WorkflowAction::MarkNotRelevant => "not-relevant",
            WorkflowAction::ReturnFromSmartsheets => "return",
            WorkflowAction::EscalateToManual => "escalate",
            WorkflowAction::SubmitCaseNotes(_) => "notes",
        }
    }
}

/// How a claim left the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Resolved,
    Manual,
}

/// The result of applying an action or finishing an automatic phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The phase did not change (e.g. a selection edit).
    Stay,
    /// Advance to a non-terminal phase.
    Next(Phase),
    /// The workflow reached a terminal phase.
    Complete(ClaimOutcome),
}

impl Transition {
    pub(crate) fn into_phase(next: Phase) -> Self {
        match next {
            Phase::Completed => Transition::Complete(ClaimOutcome::Resolved),
            Phase::ManualFlow => Transition::Complete(ClaimOutcome::Manual),
            other => Transition::Next(other),
        }
    }
}

/// Applies human decisions to a [`WorkflowState`].
pub struct WorkflowMachine;

impl WorkflowMachine {
    /// Validates `action` against the current phase and applies it.
    ///
    /// Rejected actions leave `state` untouched. Each accepted checkpoint
    /// decision is recorded in the activity log as a `success` entry.
    pub fn apply(state: &mut WorkflowState, action: WorkflowAction) -> Result<Transition, SessionError> {
        let phase = state.phase();
        let invalid = || SessionError::InvalidAction {
            action: action.name(),
            phase,
        };

        let (next, note) = match (phase, &action) {
            (Phase::NbaApproval, WorkflowAction::Approve) => (
                Phase::ActionRetrievingDocs,
                "Reviewed and approved recommended resolution steps.".to_string(),
            ),
            (Phase::NbaApproval, WorkflowAction::Reject) => (
                Phase::ManualFlow,
                "Rejected recommended resolution steps. Reverting to manual flow.".to_string(),
            ),
            (Phase::DocReview, WorkflowAction::ToggleDocument(id)) => {
                state.toggle_document(id)?;
                return Ok(Transition::Stay);
            }
            (Phase::DocReview, WorkflowAction::SelectAll) => {
                state.select_all();
                return Ok(Transition::Stay);
            }
            (Phase::DocReview, WorkflowAction::ConfirmDocuments) => {
                let count = state.selected_document_ids().len();
                if count == 0 {
                    return Err(SessionError::EmptySelection);
                }
                (
                    Phase::ActionMerging,
                    format!("Reviewed and confirmed {count} documents as relevant."),
                )
            }
            (Phase::DocReview, WorkflowAction::MarkNotRelevant) => (
                Phase::Smartsheets,
                "Marked retrieved documents as not relevant. Opening Smartsheets for client communication."
                    .to_string(),
            ),
            (Phase::Smartsheets, WorkflowAction::ReturnFromSmartsheets) => (
                Phase::DocReview,
                "Returned from Smartsheets to document review.".to_string(),
            ),
            (Phase::Smartsheets, WorkflowAction::EscalateToManual) => (
                Phase::ManualFlow,
                "No relevant documents available. Escalated to manual flow.".to_string(),
            ),
            (Phase::MergeReview, WorkflowAction::Approve) => (
                Phase::ActionSubmitting,
                "Reviewed and approved merged PDF for submission to payer portal.".to_string(),
            ),
            (Phase::MergeReview, WorkflowAction::Reject) => {
                state.clear_selection();
                (
                    Phase::DocReview,
                    "Rejected merged PDF. Returning to document selection.".to_string(),
                )
            }
            (Phase::CaseNotes, WorkflowAction::SubmitCaseNotes(notes)) => {
                if !notes.trim().is_empty() {
                    state.set_case_notes(notes.clone());
                }
                (
                    Phase::Completed,
                    "Reviewed and submitted final case notes to PMS portal.".to_string(),
                )
            }
            _ => return Err(invalid()),
        };

        state.log_mut().append_with_status(note, LogStatus::Success);
        state.enter(next);
        info!(from = %phase, to = %next, action = action.name(), "workflow transition");
        Ok(Transition::into_phase(next))
    }
}
