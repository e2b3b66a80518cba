//! The session controller.
//!
//! [`Session`] owns the [`AppState`] and is its only writer. Every public
//! method is one user action: it validates against the current screen and
//! phase, applies the change, and saves a snapshot. Automatic workflow
//! phases are driven here one task at a time so that each sub-step is
//! persisted and rendered as it happens.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::claims::{
    Claim, ClaimStatus, ClaimWorkflowData, Cohorts, QueueStats, check_extension, parse_claims,
    partition,
};
use crate::config::ClaimdeskConfig;
use crate::error::{ClaimdeskError, SessionError};
use crate::persistence::PersistenceAdapter;
use crate::workflow::{
    CancelToken, ClaimOutcome, LogStatus, Phase, PhaseRun, Simulator, StepOutcome, WorkflowAction,
    WorkflowMachine, WorkflowState,
};

/// Top-level screen of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    #[default]
    Login,
    ClaimsUpload,
    ClaimsQueue,
    EobUpload,
    Workflow,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Login => write!(f, "login"),
            Screen::ClaimsUpload => write!(f, "claims-upload"),
            Screen::ClaimsQueue => write!(f, "claims-queue"),
            Screen::EobUpload => write!(f, "eob-upload"),
            Screen::Workflow => write!(f, "workflow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// Everything the session persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub screen: Screen,
    pub user: Option<User>,
    /// The full uploaded claim list, in upload order.
    pub claims: Vec<Claim>,
    pub cohorts: Cohorts,
    /// Claim chosen for EOB upload while on the `eob-upload` screen.
    pub eob_target: Option<String>,
    pub workflow: WorkflowState,
}

impl AppState {
    /// Checks the invariants a restored snapshot must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        self.workflow.validate()?;
        if self.screen != Screen::Login && self.user.is_none() {
            return Err(format!("screen {} requires a signed-in user", self.screen));
        }
        if let Some(claim) = self
            .cohorts
            .iter()
            .find(|c| !self.claims.iter().any(|m| m.claim_id == c.claim_id))
        {
            return Err(format!("cohort claim {} is not in the claim list", claim.claim_id));
        }
        if self.screen == Screen::EobUpload {
            let target = self.eob_target.as_deref().unwrap_or_default();
            if self.cohorts.find(target).is_none() {
                return Err(format!("EOB target {target:?} is not in the work queue"));
            }
        }
        if self.screen == Screen::Workflow && self.workflow.claim().is_none() {
            return Err("workflow screen without an active claim".to_string());
        }
        Ok(())
    }
}

/// Where an automatic run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The workflow is waiting for a human decision in this phase.
    Checkpoint(Phase),
    /// The workflow reached a terminal phase.
    Finished(ClaimOutcome),
    /// The run was cancelled while in this phase.
    Cancelled(Phase),
}

/// Receives the workflow state after every change made by the session.
pub trait SessionObserver {
    fn workflow_changed(&mut self, _workflow: &WorkflowState) {}
}

pub struct Session {
    app: AppState,
    persistence: PersistenceAdapter,
    simulator: Simulator,
    config: ClaimdeskConfig,
    observer: Option<Box<dyn SessionObserver>>,
}

impl Session {
    /// Opens a session, restoring the last snapshot if there is one.
    pub fn open(
        config: ClaimdeskConfig,
        persistence: PersistenceAdapter,
        simulator: Simulator,
    ) -> Self {
        let app = persistence.restore();
        Self {
            app,
            persistence,
            simulator,
            config,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn workflow(&self) -> &WorkflowState {
        &self.app.workflow
    }

    pub fn config(&self) -> &ClaimdeskConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.simulator.cancel_token()
    }

    // -- session ---------------------------------------------------------

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        self.require_screen(&[Screen::Login])?;
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::MissingCredential("username"));
        }
        if password.trim().is_empty() {
            return Err(SessionError::MissingCredential("password"));
        }

        self.app.user = Some(User {
            username: username.to_string(),
        });
        self.app.screen = Screen::ClaimsUpload;
        info!(username, "signed in");
        self.persist();
        Ok(())
    }

    /// Drops the whole session, including the stored snapshot.
    pub fn logout(&mut self) {
        self.app = AppState::default();
        self.persistence.clear();
        info!("signed out");
    }

    // -- claims ----------------------------------------------------------

    /// Parses an uploaded claim list and replaces the current batch.
    /// Returns the number of claims in the work queue.
    pub fn upload_csv(&mut self, content: &str) -> Result<usize, ClaimdeskError> {
        self.require_screen(&[Screen::ClaimsUpload, Screen::ClaimsQueue])?;
        let claims = parse_claims(content, self.config.unclassified_fallback())?;
        Ok(self.upload_claims(claims)?)
    }

    /// Replaces the current batch with `claims`.
    pub fn upload_claims(&mut self, claims: Vec<Claim>) -> Result<usize, SessionError> {
        self.require_screen(&[Screen::ClaimsUpload, Screen::ClaimsQueue])?;
        self.app.cohorts = partition(&claims, &self.config.target_denial_code);
        self.app.claims = claims;
        self.app.eob_target = None;
        self.app.workflow = WorkflowState::default();
        self.app.screen = Screen::ClaimsQueue;
        info!(
            uploaded = self.app.claims.len(),
            with_eob = self.app.cohorts.with_eob.len(),
            without_eob = self.app.cohorts.without_eob.len(),
            "claim list uploaded"
        );
        self.persist();
        Ok(self.app.cohorts.len())
    }

    pub fn queue_stats(&self) -> QueueStats {
        QueueStats::compute(
            &self.app.claims,
            &self.app.cohorts,
            &self.config.target_denial_code,
        )
    }

    /// `(n, m)` for the "claim n of m" header of the active workflow.
    pub fn current_position(&self) -> Option<(usize, usize)> {
        let claim = self.app.workflow.claim()?;
        let position = QueueStats::position_of(
            &self.app.claims,
            &self.config.target_denial_code,
            &claim.claim_id,
        )?;
        Some((position, self.app.cohorts.len()))
    }

    /// Chooses a claim from the without-EOB cohort for EOB upload.
    pub fn request_eob_upload(&mut self, claim_id: &str) -> Result<(), SessionError> {
        self.require_screen(&[Screen::ClaimsQueue, Screen::EobUpload])?;
        let claim = self
            .app
            .cohorts
            .without_eob
            .iter()
            .find(|c| c.claim_id == claim_id);
        let Some(claim) = claim else {
            return Err(if self.app.cohorts.find(claim_id).is_some() {
                SessionError::EobAlreadyAttached(claim_id.to_string())
            } else {
                SessionError::ClaimNotFound(claim_id.to_string())
            });
        };
        if claim.has_eob() {
            return Err(SessionError::EobAlreadyAttached(claim_id.to_string()));
        }
        if claim.status == ClaimStatus::Completed {
            return Err(SessionError::ClaimAlreadyCompleted(claim_id.to_string()));
        }

        self.app.eob_target = Some(claim_id.to_string());
        self.app.screen = Screen::EobUpload;
        self.persist();
        Ok(())
    }

    /// Attaches an EOB file to the targeted claim and starts its workflow.
    pub async fn upload_eob(&mut self, file_name: &str) -> Result<RunOutcome, ClaimdeskError> {
        self.require_screen(&[Screen::EobUpload])?;
        check_extension(file_name, "pdf")?;
        let Some(claim_id) = self.app.eob_target.clone() else {
            return Err(SessionError::ClaimNotFound(String::new()).into());
        };

        let reference = format!("https://example.com/eob/{claim_id}/{file_name}");
        self.update_claim(&claim_id, |c| c.eob_reference = Some(reference.clone()));
        info!(%claim_id, %reference, "EOB attached");

        self.begin_workflow(&claim_id)?;
        Ok(self.run_automatic().await)
    }

    /// Picks `claim_id` for EOB upload and attaches `file_name` in one step.
    /// The file type is checked before the queue is left.
    pub async fn attach_eob(
        &mut self,
        claim_id: &str,
        file_name: &str,
    ) -> Result<RunOutcome, ClaimdeskError> {
        check_extension(file_name, "pdf")?;
        self.request_eob_upload(claim_id)?;
        self.upload_eob(file_name).await
    }

    /// Starts the workflow for a queued claim that already has an EOB.
    pub async fn start_claim(&mut self, claim_id: &str) -> Result<RunOutcome, SessionError> {
        self.require_screen(&[Screen::ClaimsQueue])?;
        let claim = self
            .app
            .cohorts
            .find(claim_id)
            .ok_or_else(|| SessionError::ClaimNotFound(claim_id.to_string()))?;
        if claim.status == ClaimStatus::Completed {
            return Err(SessionError::ClaimAlreadyCompleted(claim_id.to_string()));
        }
        if !claim.has_eob() {
            return Err(SessionError::EobRequired(claim_id.to_string()));
        }

        self.begin_workflow(claim_id)?;
        Ok(self.run_automatic().await)
    }

    // -- workflow --------------------------------------------------------

    /// Applies a human decision, then runs any automatic phases that follow.
    pub async fn act(&mut self, action: WorkflowAction) -> Result<RunOutcome, SessionError> {
        self.require_screen(&[Screen::Workflow])?;
        WorkflowMachine::apply(&mut self.app.workflow, action)?;
        self.persist();
        self.notify();
        Ok(self.run_automatic().await)
    }

    /// Re-runs an interrupted automatic phase from its first sub-step.
    pub async fn resume(&mut self) -> Result<RunOutcome, SessionError> {
        self.require_screen(&[Screen::Workflow])?;
        self.simulator.cancel_token().reset();
        Ok(self.run_automatic().await)
    }

    /// Leaves a completed workflow and marks the claim completed.
    pub fn next_claim(&mut self) -> Result<(), SessionError> {
        self.require_screen(&[Screen::Workflow])?;
        let phase = self.app.workflow.phase();
        if phase != Phase::Completed {
            return Err(SessionError::InvalidAction {
                action: "next",
                phase,
            });
        }
        self.leave_workflow(ClaimStatus::Completed);
        Ok(())
    }

    /// Returns to the claims queue from the EOB upload or workflow screen.
    ///
    /// Leaving `manual-flow` marks the claim failed; leaving an unfinished
    /// workflow puts the claim back to pending.
    pub fn back_to_queue(&mut self) -> Result<(), SessionError> {
        self.require_screen(&[Screen::EobUpload, Screen::Workflow])?;
        if self.app.screen == Screen::EobUpload {
            self.app.eob_target = None;
            self.app.screen = Screen::ClaimsQueue;
            self.persist();
            return Ok(());
        }

        let status = match self.app.workflow.phase() {
            Phase::Completed => ClaimStatus::Completed,
            Phase::ManualFlow => ClaimStatus::Failed,
            _ => ClaimStatus::Pending,
        };
        self.leave_workflow(status);
        Ok(())
    }

    // -- internals -------------------------------------------------------

    fn require_screen(&self, allowed: &[Screen]) -> Result<(), SessionError> {
        let actual = self.app.screen;
        if actual != Screen::Login && self.app.user.is_none() {
            return Err(SessionError::NotSignedIn);
        }
        if allowed.contains(&actual) {
            return Ok(());
        }
        if actual == Screen::Login {
            return Err(SessionError::NotSignedIn);
        }
        Err(SessionError::WrongScreen {
            expected: allowed[0],
            actual,
        })
    }

    fn begin_workflow(&mut self, claim_id: &str) -> Result<(), SessionError> {
        let claim = self
            .app
            .cohorts
            .find(claim_id)
            .ok_or_else(|| SessionError::ClaimNotFound(claim_id.to_string()))?;
        let data = ClaimWorkflowData::from_claim(claim, &self.config.rarc_code);

        self.update_claim(claim_id, |c| c.status = ClaimStatus::InProgress);
        self.app.workflow = WorkflowState::start(data);
        self.app.eob_target = None;
        self.app.screen = Screen::Workflow;
        info!(claim_id, "workflow started");
        self.persist();
        self.notify();
        Ok(())
    }

    fn leave_workflow(&mut self, status: ClaimStatus) {
        if let Some(claim_id) = self.app.workflow.claim().map(|c| c.claim_id.clone()) {
            self.update_claim(&claim_id, |c| c.status = status);
            info!(%claim_id, %status, "returned to queue");
        }
        self.app.screen = Screen::ClaimsQueue;
        self.persist();
    }

    /// Applies `f` to every copy of the claim: the master list and its cohort.
    fn update_claim(&mut self, claim_id: &str, f: impl Fn(&mut Claim)) {
        self.app
            .claims
            .iter_mut()
            .chain(self.app.cohorts.iter_mut())
            .filter(|c| c.claim_id == claim_id)
            .for_each(f);
    }

    /// Runs automatic phases until the workflow needs a human, finishes, or
    /// is cancelled.
    async fn run_automatic(&mut self) -> RunOutcome {
        loop {
            let phase = self.app.workflow.phase();
            if phase.is_terminal() {
                let outcome = if phase == Phase::Completed {
                    ClaimOutcome::Resolved
                } else {
                    ClaimOutcome::Manual
                };
                return RunOutcome::Finished(outcome);
            }
            let Some(mut run) = PhaseRun::plan(&self.app.workflow) else {
                return RunOutcome::Checkpoint(phase);
            };
            debug!(phase = %run.phase(), tasks = run.remaining(), "running automatic phase");

            loop {
                let outcome = self.simulator.step(&mut run, &mut self.app.workflow).await;
                if outcome == StepOutcome::Cancelled {
                    self.interrupt();
                    return RunOutcome::Cancelled(phase);
                }
                self.persist();
                self.notify();
                if outcome != StepOutcome::Continue {
                    break;
                }
            }
        }
    }

    /// Settles a sub-step left running by a cancelled run.
    fn interrupt(&mut self) {
        let log = self.app.workflow.log_mut();
        if log.last().is_some_and(|e| e.status == LogStatus::Running) {
            log.set_last_status(LogStatus::Error);
            warn!(phase = %self.app.workflow.phase(), "sub-step interrupted");
        }
        self.persist();
        self.notify();
    }

    fn persist(&mut self) {
        if self.app.screen != Screen::Login {
            self.persistence.save(&self.app);
        }
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.workflow_changed(&self.app.workflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::fixtures::sample_claims;
    use crate::persistence::MemoryCache;
    use crate::workflow::{Pacing, ScriptedFailures};

    fn session_with(cache: &MemoryCache, script: &[bool]) -> Session {
        Session::open(
            ClaimdeskConfig::default(),
            PersistenceAdapter::new(Box::new(cache.clone())),
            Simulator::new(Pacing::Instant, ScriptedFailures::boxed(script), 2),
        )
    }

    fn queued(cache: &MemoryCache, script: &[bool]) -> Session {
        let mut session = session_with(cache, script);
        session.login("maria", "secret").unwrap();
        session.upload_claims(sample_claims()).unwrap();
        session
    }

    fn status_of(session: &Session, claim_id: &str) -> ClaimStatus {
        session
            .app()
            .claims
            .iter()
            .find(|c| c.claim_id == claim_id)
            .unwrap()
            .status
    }

    #[test]
    fn login_requires_credentials() {
        let mut session = session_with(&MemoryCache::new(), &[]);
        assert_eq!(
            session.login("  ", "pw"),
            Err(SessionError::MissingCredential("username"))
        );
        assert_eq!(
            session.login("maria", ""),
            Err(SessionError::MissingCredential("password"))
        );
        assert_eq!(session.app().screen, Screen::Login);

        session.login("maria", "pw").unwrap();
        assert_eq!(session.app().screen, Screen::ClaimsUpload);
        assert_eq!(session.app().user.as_ref().unwrap().username, "maria");
    }

    #[test]
    fn actions_require_sign_in() {
        let mut session = session_with(&MemoryCache::new(), &[]);
        assert_eq!(
            session.upload_claims(sample_claims()),
            Err(SessionError::NotSignedIn)
        );
        assert_eq!(session.back_to_queue(), Err(SessionError::NotSignedIn));
    }

    #[test]
    fn upload_csv_builds_cohorts() {
        let mut session = session_with(&MemoryCache::new(), &[]);
        session.login("maria", "pw").unwrap();
        let csv = "Claim ID,Patient,Denial Code,Denial Reason,Billed Amount,EOB\n\
                   A1,Ann,CO252,Docs needed,\"$1,000.00\",https://eob/a1.pdf\n\
                   A2,Bob,CO252,Docs needed,50,\n\
                   A3,Cid,CO16,Missing info,75,n/a\n";
        assert_eq!(session.upload_csv(csv).unwrap(), 2);
        assert_eq!(session.app().screen, Screen::ClaimsQueue);
        assert_eq!(session.app().claims.len(), 3);
        assert_eq!(session.app().cohorts.with_eob[0].claim_id, "A1");
        assert_eq!(session.app().cohorts.without_eob[0].claim_id, "A2");
    }

    #[test]
    fn rejected_upload_leaves_state_alone() {
        let mut session = queued(&MemoryCache::new(), &[]);
        let before = session.app().clone();
        let err = session.upload_csv("Claim ID,Patient\n1,Ann\n").unwrap_err();
        assert!(matches!(err, ClaimdeskError::Upload(_)));
        assert_eq!(session.app(), &before);
    }

    #[tokio::test]
    async fn claim_with_eob_runs_analysis() {
        let mut session = queued(&MemoryCache::new(), &[]);
        assert!(session.app().cohorts.with_eob.iter().any(|c| c.claim_id == "440553"));
        assert!(session.app().cohorts.without_eob.iter().all(|c| c.claim_id != "440553"));

        let outcome = session.start_claim("440553").await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::NbaApproval));
        assert_eq!(session.app().screen, Screen::Workflow);
        assert_eq!(session.workflow().phase_history(), [Phase::NbaProcessing]);
        assert_eq!(status_of(&session, "440553"), ClaimStatus::InProgress);
        assert_eq!(session.current_position(), Some((1, 4)));
    }

    #[tokio::test]
    async fn claim_without_eob_needs_upload_first() {
        let mut session = queued(&MemoryCache::new(), &[]);
        assert_eq!(
            session.start_claim("440555").await,
            Err(SessionError::EobRequired("440555".into()))
        );
        assert_eq!(
            session.request_eob_upload("440553"),
            Err(SessionError::EobAlreadyAttached("440553".into()))
        );

        session.request_eob_upload("440555").unwrap();
        assert_eq!(session.app().screen, Screen::EobUpload);

        let before = session.app().clone();
        let err = session.upload_eob("eob.png").await.unwrap_err();
        assert!(matches!(err, ClaimdeskError::Upload(_)));
        assert_eq!(session.app(), &before);

        let outcome = session.upload_eob("eob-440555.pdf").await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::NbaApproval));
        let expected = "https://example.com/eob/440555/eob-440555.pdf";
        let cohort_copy = session.app().cohorts.find("440555").unwrap();
        assert_eq!(cohort_copy.eob_reference.as_deref(), Some(expected));
        let master = session.app().claims.iter().find(|c| c.claim_id == "440555").unwrap();
        assert_eq!(master.eob_reference.as_deref(), Some(expected));
        assert_eq!(
            session.workflow().claim().unwrap().eob_reference.as_deref(),
            Some(expected)
        );
    }

    #[tokio::test]
    async fn attaching_wrong_file_type_keeps_queue() {
        let cache = MemoryCache::new();
        let mut session = queued(&cache, &[]);
        let before = session.app().clone();

        let err = session.attach_eob("440555", "scan.png").await.unwrap_err();
        assert!(matches!(
            err,
            ClaimdeskError::Upload(UploadError::WrongFileType { .. })
        ));
        assert_eq!(session.app(), &before);
        assert_eq!(session.app().screen, Screen::ClaimsQueue);
        assert_eq!(session_with(&cache, &[]).app(), &before);

        let outcome = session.start_claim("440553").await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::NbaApproval));
    }

    #[tokio::test]
    async fn attach_eob_starts_workflow() {
        let mut session = queued(&MemoryCache::new(), &[]);
        let outcome = session.attach_eob("440556", "eob.pdf").await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::NbaApproval));
        assert_eq!(session.workflow().claim().unwrap().claim_id, "440556");
    }

    #[test]
    fn duplicate_claim_ids_leave_state_alone() {
        let mut session = queued(&MemoryCache::new(), &[]);
        let before = session.app().clone();
        let csv = "Claim ID,Patient,Denial Code,Denial Reason,EOB\n\
                   A1,Ann,CO252,Docs needed,https://eob/a1.pdf\n\
                   A1,Bob,CO252,Docs needed,\n";
        let err = session.upload_csv(csv).unwrap_err();
        assert!(matches!(
            err,
            ClaimdeskError::Upload(UploadError::DuplicateClaimId { .. })
        ));
        assert_eq!(session.app(), &before);
    }

    #[tokio::test]
    async fn rejecting_analysis_goes_to_manual_flow() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.start_claim("440553").await.unwrap();
        let entries = session.workflow().log().len();

        let outcome = session.act(WorkflowAction::Reject).await.unwrap();
        assert_eq!(outcome, RunOutcome::Finished(ClaimOutcome::Manual));
        assert_eq!(session.workflow().phase(), Phase::ManualFlow);
        assert_eq!(session.workflow().log().len(), entries + 1);

        session.back_to_queue().unwrap();
        assert_eq!(status_of(&session, "440553"), ClaimStatus::Failed);
        assert_eq!(session.app().screen, Screen::ClaimsQueue);
    }

    #[tokio::test]
    async fn selected_documents_are_merged() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.start_claim("440553").await.unwrap();
        let outcome = session.act(WorkflowAction::Approve).await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::DocReview));

        session.act(WorkflowAction::ToggleDocument("1".into())).await.unwrap();
        session.act(WorkflowAction::ToggleDocument("3".into())).await.unwrap();
        let outcome = session.act(WorkflowAction::ConfirmDocuments).await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::MergeReview));
        assert!(session.workflow().phase_history().contains(&Phase::ActionMerging));
        assert!(session.workflow().merged_artifact().is_some_and(|r| !r.is_empty()));
    }

    #[tokio::test]
    async fn full_run_completes_claim() {
        let mut session = queued(&MemoryCache::new(), &[false]);
        session.start_claim("440553").await.unwrap();
        session.act(WorkflowAction::Approve).await.unwrap();
        session.act(WorkflowAction::SelectAll).await.unwrap();
        session.act(WorkflowAction::ConfirmDocuments).await.unwrap();
        let outcome = session.act(WorkflowAction::Approve).await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::CaseNotes));
        assert!(session.workflow().case_notes().contains("Claim ID: 440553"));

        assert_eq!(
            session.next_claim(),
            Err(SessionError::InvalidAction {
                action: "next",
                phase: Phase::CaseNotes
            })
        );
        let outcome = session
            .act(WorkflowAction::SubmitCaseNotes(String::new()))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Finished(ClaimOutcome::Resolved));

        session.next_claim().unwrap();
        assert_eq!(status_of(&session, "440553"), ClaimStatus::Completed);
        let stats = session.queue_stats();
        assert_eq!(stats.completed_with_eob, 1);
        assert_eq!(stats.next_with_eob.as_deref(), Some("440554"));
        assert_eq!(
            session.start_claim("440553").await,
            Err(SessionError::ClaimAlreadyCompleted("440553".into()))
        );
    }

    #[tokio::test]
    async fn repeated_submission_failure_escalates() {
        let mut session = queued(&MemoryCache::new(), &[true, true]);
        session.start_claim("440554").await.unwrap();
        session.act(WorkflowAction::Approve).await.unwrap();
        session.act(WorkflowAction::ToggleDocument("2".into())).await.unwrap();
        session.act(WorkflowAction::ConfirmDocuments).await.unwrap();
        let outcome = session.act(WorkflowAction::Approve).await.unwrap();
        assert_eq!(outcome, RunOutcome::Finished(ClaimOutcome::Manual));
        assert_eq!(session.workflow().retry_count(), 1);
        assert_eq!(session.workflow().log().count_with_status(LogStatus::Error), 2);
    }

    #[tokio::test]
    async fn smartsheets_escalation() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.start_claim("440553").await.unwrap();
        session.act(WorkflowAction::Approve).await.unwrap();
        session.act(WorkflowAction::MarkNotRelevant).await.unwrap();
        let outcome = session.act(WorkflowAction::EscalateToManual).await.unwrap();
        assert_eq!(outcome, RunOutcome::Finished(ClaimOutcome::Manual));
    }

    #[tokio::test]
    async fn invalid_action_changes_nothing() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.start_claim("440553").await.unwrap();
        let before = session.app().clone();
        let err = session.act(WorkflowAction::ConfirmDocuments).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidAction { .. }));
        assert_eq!(session.app(), &before);
    }

    #[tokio::test]
    async fn leaving_mid_workflow_resets_claim_to_pending() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.start_claim("440554").await.unwrap();
        session.back_to_queue().unwrap();
        assert_eq!(status_of(&session, "440554"), ClaimStatus::Pending);
        assert_eq!(
            session.back_to_queue(),
            Err(SessionError::WrongScreen {
                expected: Screen::EobUpload,
                actual: Screen::ClaimsQueue
            })
        );
    }

    #[tokio::test]
    async fn restart_restores_last_snapshot() {
        let cache = MemoryCache::new();
        let mut session = queued(&cache, &[]);
        session.start_claim("440553").await.unwrap();
        session.act(WorkflowAction::Approve).await.unwrap();
        session.act(WorkflowAction::ToggleDocument("5".into())).await.unwrap();

        let restarted = session_with(&cache, &[]);
        assert_eq!(restarted.app(), session.app());
        assert_eq!(restarted.workflow().selected_document_ids(), ["5"]);
    }

    #[test]
    fn login_screen_is_not_persisted() {
        let cache = MemoryCache::new();
        let mut session = session_with(&cache, &[]);
        let _ = session.login("", "");
        assert!(
            crate::persistence::KeyValueCache::read(&cache, crate::persistence::STATE_KEY)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn logout_clears_everything() {
        let cache = MemoryCache::new();
        let mut session = queued(&cache, &[]);
        session.logout();
        assert_eq!(session.app(), &AppState::default());
        assert_eq!(session_with(&cache, &[]).app(), &AppState::default());
    }

    #[tokio::test]
    async fn cancelled_run_can_be_resumed() {
        let mut session = queued(&MemoryCache::new(), &[]);
        session.cancel_token().cancel();
        let outcome = session.start_claim("440553").await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled(Phase::NbaProcessing));
        assert_eq!(session.workflow().phase(), Phase::NbaProcessing);

        let outcome = session.resume().await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::NbaApproval));
    }

    /// Cancels the session once a log entry with `message` has been recorded.
    struct CancelAfter {
        message: &'static str,
        token: CancelToken,
    }

    impl SessionObserver for CancelAfter {
        fn workflow_changed(&mut self, workflow: &WorkflowState) {
            if workflow.log().entries().iter().any(|e| e.message == self.message) {
                self.token.cancel();
            }
        }
    }

    #[tokio::test]
    async fn resume_after_accepted_upload_reaches_case_notes() {
        let cache = MemoryCache::new();
        let mut session = queued(&cache, &[false, true, true]);
        session.start_claim("440553").await.unwrap();
        session.act(WorkflowAction::Approve).await.unwrap();
        session.act(WorkflowAction::SelectAll).await.unwrap();
        session.act(WorkflowAction::ConfirmDocuments).await.unwrap();

        let token = session.cancel_token();
        session.set_observer(Box::new(CancelAfter {
            message: "Documentation submitted successfully to payer portal.",
            token,
        }));
        let outcome = session.act(WorkflowAction::Approve).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled(Phase::ActionSubmitting));
        assert!(session.workflow().upload_confirmed());

        let mut restarted = session_with(&cache, &[true, true]);
        assert!(restarted.workflow().upload_confirmed());
        let outcome = restarted.resume().await.unwrap();
        assert_eq!(outcome, RunOutcome::Checkpoint(Phase::CaseNotes));
        assert_eq!(restarted.workflow().retry_count(), 0);
        assert!(
            restarted
                .workflow()
                .log()
                .entries()
                .iter()
                .all(|e| !e.message.starts_with("Retry failed"))
        );
    }

    #[test]
    fn snapshot_validation() {
        let mut state = AppState {
            screen: Screen::Workflow,
            user: Some(User {
                username: "maria".into(),
            }),
            ..AppState::default()
        };
        assert!(state.validate().is_err());
        state.screen = Screen::ClaimsQueue;
        assert!(state.validate().is_ok());
        state.user = None;
        assert!(state.validate().is_err());
    }
}
