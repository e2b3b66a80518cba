use serde::{Deserialize, Serialize};

use super::log::ActivityLog;
use super::phase::Phase;
use crate::claims::ClaimWorkflowData;
use crate::error::SessionError;

/// A medical-record document retrieved from the PMS portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub category: String,
    pub date: String,
    pub code: String,
    pub provider: String,
}

/// Everything tracked for the claim currently being worked.
///
/// The selection is only ever changed through [`toggle_document`],
/// [`select_all`] and [`clear_selection`], which keep it a subset of the
/// retrieved documents.
///
/// [`toggle_document`]: WorkflowState::toggle_document
/// [`select_all`]: WorkflowState::select_all
/// [`clear_selection`]: WorkflowState::clear_selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    phase: Phase,
    phase_history: Vec<Phase>,
    claim: Option<ClaimWorkflowData>,
    log: ActivityLog,
    documents: Vec<Document>,
    selected_document_ids: Vec<String>,
    merged_artifact: Option<String>,
    case_notes: String,
    retry_count: u32,
    /// Set once the payer accepted the upload for the current submission.
    #[serde(default)]
    upload_confirmed: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: Phase::NbaProcessing,
            phase_history: Vec::new(),
            claim: None,
            log: ActivityLog::new(),
            documents: Vec::new(),
            selected_document_ids: Vec::new(),
            merged_artifact: None,
            case_notes: String::new(),
            retry_count: 0,
            upload_confirmed: false,
        }
    }
}

impl WorkflowState {
    /// Fresh state for a newly started claim, positioned at `nba-processing`.
    pub fn start(claim: ClaimWorkflowData) -> Self {
        Self {
            claim: Some(claim),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_history(&self) -> &[Phase] {
        &self.phase_history
    }

    pub fn claim(&self) -> Option<&ClaimWorkflowData> {
        self.claim.as_ref()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn selected_document_ids(&self) -> &[String] {
        &self.selected_document_ids
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_document_ids.iter().any(|s| s == id)
    }

    /// Selected documents in retrieval order.
    pub fn selected_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| self.is_selected(&d.id))
    }

    pub fn merged_artifact(&self) -> Option<&str> {
        self.merged_artifact.as_deref()
    }

    pub fn case_notes(&self) -> &str {
        &self.case_notes
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn upload_confirmed(&self) -> bool {
        self.upload_confirmed
    }

    /// Adds `id` to the selection if absent, removes it if present.
    /// Returns whether the document is selected afterwards.
    pub fn toggle_document(&mut self, id: &str) -> Result<bool, SessionError> {
        if !self.documents.iter().any(|d| d.id == id) {
            return Err(SessionError::UnknownDocument(id.to_string()));
        }
        if let Some(pos) = self.selected_document_ids.iter().position(|s| s == id) {
            self.selected_document_ids.remove(pos);
            Ok(false)
        } else {
            self.selected_document_ids.push(id.to_string());
            Ok(true)
        }
    }

    pub fn select_all(&mut self) {
        self.selected_document_ids = self.documents.iter().map(|d| d.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected_document_ids.clear();
    }

    pub(crate) fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    pub(crate) fn enter(&mut self, next: Phase) {
        self.phase_history.push(self.phase);
        self.phase = next;
        if next == Phase::ActionSubmitting {
            self.upload_confirmed = false;
        }
    }

    /// Replaces the retrieved documents, dropping any selected id that is no
    /// longer present.
    pub(crate) fn install_documents(&mut self, documents: Vec<Document>) {
        self.documents = documents;
        let documents = &self.documents;
        self.selected_document_ids
            .retain(|id| documents.iter().any(|d| &d.id == id));
    }

    pub(crate) fn set_merged_artifact(&mut self, reference: String) {
        self.merged_artifact = Some(reference);
    }

    pub(crate) fn set_case_notes(&mut self, notes: String) {
        self.case_notes = notes;
    }

    pub(crate) fn confirm_upload(&mut self) {
        self.upload_confirmed = true;
    }

    pub(crate) fn bump_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    /// Checks the invariants a restored snapshot must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = self
            .selected_document_ids
            .iter()
            .find(|id| !self.documents.iter().any(|d| &d.id == *id))
        {
            return Err(format!("selected document {id} was never retrieved"));
        }
        let mut seen = std::collections::HashSet::new();
        if !self.selected_document_ids.iter().all(|id| seen.insert(id)) {
            return Err("duplicate document in selection".to_string());
        }
        if !self.log.is_consistent() {
            return Err("activity log ids are not monotonic".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::retrieved_documents;
    use proptest::prelude::*;

    fn with_documents() -> WorkflowState {
        let mut state = WorkflowState::default();
        state.install_documents(retrieved_documents());
        state
    }

    #[test]
    fn default_starts_at_analysis() {
        let state = WorkflowState::default();
        assert_eq!(state.phase(), Phase::NbaProcessing);
        assert!(state.claim().is_none());
        assert!(state.log().is_empty());
        assert_eq!(state.retry_count(), 0);
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut state = with_documents();
        assert_eq!(state.toggle_document("3"), Ok(true));
        assert_eq!(state.toggle_document("1"), Ok(true));
        assert_eq!(state.selected_document_ids(), ["3", "1"]);

        let names: Vec<_> = state.selected_documents().map(|d| d.id.as_str()).collect();
        assert_eq!(names, vec!["1", "3"]);

        assert_eq!(state.toggle_document("3"), Ok(false));
        assert_eq!(state.selected_document_ids(), ["1"]);
    }

    #[test]
    fn toggle_unknown_document_is_rejected() {
        let mut state = with_documents();
        assert_eq!(
            state.toggle_document("99"),
            Err(SessionError::UnknownDocument("99".into()))
        );
        assert!(state.selected_document_ids().is_empty());
    }

    #[test]
    fn select_all_and_clear() {
        let mut state = with_documents();
        state.toggle_document("2").unwrap();
        state.select_all();
        assert_eq!(state.selected_document_ids().len(), 8);
        state.clear_selection();
        assert!(state.selected_document_ids().is_empty());
    }

    #[test]
    fn reinstalling_documents_prunes_selection() {
        let mut state = with_documents();
        state.toggle_document("7").unwrap();
        state.toggle_document("2").unwrap();
        let fewer: Vec<_> = retrieved_documents().into_iter().take(3).collect();
        state.install_documents(fewer);
        assert_eq!(state.selected_document_ids(), ["2"]);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn validate_rejects_foreign_selection() {
        let json = r#"{
            "phase": "doc-review", "phaseHistory": [], "claim": null,
            "log": {"entries": [], "nextId": 0},
            "documents": [], "selectedDocumentIds": ["4"],
            "mergedArtifact": null, "caseNotes": "", "retryCount": 0
        }"#;
        let state: WorkflowState = serde_json::from_str(json).unwrap();
        assert!(!state.upload_confirmed());
        assert!(state.validate().is_err());
    }

    proptest! {
        #[test]
        fn toggle_is_an_involution(ops in prop::collection::vec(1u8..=8, 0..12), target in 1u8..=8) {
            let mut state = with_documents();
            for op in ops {
                state.toggle_document(&op.to_string()).unwrap();
            }
            let mut before = state.selected_document_ids().to_vec();
            state.toggle_document(&target.to_string()).unwrap();
            state.toggle_document(&target.to_string()).unwrap();
            let mut after = state.selected_document_ids().to_vec();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn selection_stays_within_documents(ops in prop::collection::vec(0u8..=10, 0..20)) {
            let mut state = with_documents();
            for op in ops {
                match op {
                    0 => state.select_all(),
                    9 => state.clear_selection(),
                    n => { let _ = state.toggle_document(&n.to_string()); }
                }
                prop_assert!(state.validate().is_ok());
            }
        }
    }
}
