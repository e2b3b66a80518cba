use thiserror::Error;

use crate::session::Screen;
use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum ClaimdeskError {
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("{0}")]
    Session(#[from] SessionError),
}

/// Rejections raised while ingesting a claim list or an EOB file.
///
/// None of these mutate session state; the user can simply retry with
/// another file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("CSV file must have a header row and at least one data row")]
    TooFewRows,

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Invalid billed amount on row {row}: {value:?}")]
    InvalidAmount { row: usize, value: String },

    #[error("No valid claims found in the CSV file")]
    NoClaims,

    #[error("Duplicate claim ID on row {row}: {claim_id}")]
    DuplicateClaimId { row: usize, claim_id: String },

    #[error("Please upload a {expected} file (got {name})")]
    WrongFileType { expected: &'static str, name: String },
}

/// Rejected user actions. The session is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Please enter your {0}")]
    MissingCredential(&'static str),

    #[error("Not signed in. Run `claimdesk login` first.")]
    NotSignedIn,

    #[error("Action not available on the {actual} screen (expected {expected})")]
    WrongScreen { expected: Screen, actual: Screen },

    #[error("Claim not found in the work queue: {0}")]
    ClaimNotFound(String),

    #[error("Claim {0} has no EOB yet. Upload one with `claimdesk eob`.")]
    EobRequired(String),

    #[error("Claim {0} already has an EOB attached")]
    EobAlreadyAttached(String),

    #[error("Claim {0} is already completed")]
    ClaimAlreadyCompleted(String),

    #[error("`{action}` is not allowed while the workflow is in {phase}")]
    InvalidAction { action: &'static str, phase: Phase },

    #[error("Document not found among retrieved documents: {0}")]
    UnknownDocument(String),

    #[error("Select at least one document before confirming")]
    EmptySelection,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_messages() {
        assert_eq!(
            UploadError::MissingColumn("denial code").to_string(),
            "Missing required column: denial code"
        );
        assert_eq!(
            UploadError::InvalidAmount {
                row: 3,
                value: "abc".into()
            }
            .to_string(),
            "Invalid billed amount on row 3: \"abc\""
        );
        assert_eq!(
            UploadError::DuplicateClaimId {
                row: 4,
                claim_id: "A1".into()
            }
            .to_string(),
            "Duplicate claim ID on row 4: A1"
        );
    }

    #[test]
    fn invalid_action_names_phase() {
        let err = SessionError::InvalidAction {
            action: "approve",
            phase: Phase::DocReview,
        };
        assert_eq!(
            err.to_string(),
            "`approve` is not allowed while the workflow is in doc-review"
        );
    }

    #[test]
    fn session_error_wraps_transparently() {
        let err: ClaimdeskError = SessionError::EmptySelection.into();
        assert_eq!(
            err.to_string(),
            "Select at least one document before confirming"
        );
    }

    #[test]
    fn upload_error_keeps_its_prefix() {
        let err: ClaimdeskError = UploadError::NoClaims.into();
        assert!(matches!(err, ClaimdeskError::Upload(UploadError::NoClaims)));
        assert_eq!(
            err.to_string(),
            "Upload error: No valid claims found in the CSV file"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClaimdeskError>();
    }
}
