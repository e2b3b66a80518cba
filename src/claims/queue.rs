use serde::{Deserialize, Serialize};

use super::record::{Claim, ClaimStatus};

/// The two work cohorts for a target denial code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohorts {
    pub with_eob: Vec<Claim>,
    pub without_eob: Vec<Claim>,
}

impl Cohorts {
    pub fn len(&self) -> usize {
        self.with_eob.len() + self.without_eob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, claim_id: &str) -> Option<&Claim> {
        self.iter().find(|c| c.claim_id == claim_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.with_eob.iter().chain(self.without_eob.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Claim> {
        self.with_eob.iter_mut().chain(self.without_eob.iter_mut())
    }
}

/// Splits `claims` into the with-EOB and without-EOB cohorts for
/// `denial_code`, preserving upload order. Claims with any other (or no)
/// denial code land in neither cohort.
pub fn partition(claims: &[Claim], denial_code: &str) -> Cohorts {
    let (with_eob, without_eob) = claims
        .iter()
        .filter(|c| c.has_denial_code(denial_code))
        .cloned()
        .partition(Claim::has_eob);
    Cohorts {
        with_eob,
        without_eob,
    }
}

/// Progress figures shown on the claims queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub total_uploaded: usize,
    pub total_targeted: usize,
    pub with_eob: usize,
    pub without_eob: usize,
    pub completed_with_eob: usize,
    pub completed_without_eob: usize,
    pub next_with_eob: Option<String>,
    pub next_without_eob: Option<String>,
}

impl QueueStats {
    pub fn compute(claims: &[Claim], cohorts: &Cohorts, denial_code: &str) -> Self {
        let completed = |list: &[Claim]| {
            list.iter()
                .filter(|c| c.status == ClaimStatus::Completed)
                .count()
        };
        let next_pending = |list: &[Claim]| {
            list.iter()
                .find(|c| c.status == ClaimStatus::Pending)
                .map(|c| c.claim_id.clone())
        };

        Self {
            total_uploaded: claims.len(),
            total_targeted: claims
                .iter()
                .filter(|c| c.has_denial_code(denial_code))
                .count(),
            with_eob: cohorts.with_eob.len(),
            without_eob: cohorts.without_eob.len(),
            completed_with_eob: completed(&cohorts.with_eob),
            completed_without_eob: completed(&cohorts.without_eob),
            next_with_eob: next_pending(&cohorts.with_eob),
            next_without_eob: next_pending(&cohorts.without_eob),
        }
    }

    /// 1-based position of `claim_id` among the targeted claims of the
    /// upload, used for the "claim N of M" header.
    pub fn position_of(claims: &[Claim], denial_code: &str, claim_id: &str) -> Option<usize> {
        claims
            .iter()
            .filter(|c| c.has_denial_code(denial_code))
            .position(|c| c.claim_id == claim_id)
            .map(|p| p + 1)
    }
}
