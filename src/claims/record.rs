use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixtures::RESOLUTION_STEPS;

/// Processing status of an uploaded claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Pending => write!(f, "pending"),
            ClaimStatus::InProgress => write!(f, "in-progress"),
            ClaimStatus::Completed => write!(f, "completed"),
            ClaimStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A denied claim as ingested from the uploaded claim list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub claim_id: String,
    pub patient_name: String,
    pub date_of_service: String,
    pub provider: String,
    pub payer: String,
    /// `None` when the upload row carried no denial code. Such claims are
    /// never placed in a work cohort.
    pub denial_code: Option<String>,
    pub denial_reason: String,
    pub billed_amount: f64,
    pub eob_reference: Option<String>,
    pub status: ClaimStatus,
}

impl Claim {
    pub fn has_eob(&self) -> bool {
        self.eob_reference.is_some()
    }

    pub fn has_denial_code(&self, code: &str) -> bool {
        self.denial_code.as_deref() == Some(code)
    }
}

/// Projection of a [`Claim`] used for the lifetime of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimWorkflowData {
    pub claim_id: String,
    pub patient_name: String,
    pub date_of_service: String,
    pub provider: String,
    pub payer: String,
    pub carc_code: String,
    pub rarc_code: String,
    pub denial_reason: String,
    pub resolution_steps: Vec<String>,
    pub billed_amount: f64,
    pub eob_reference: Option<String>,
}

impl ClaimWorkflowData {
    pub fn from_claim(claim: &Claim, rarc_code: &str) -> Self {
        Self {
            claim_id: claim.claim_id.clone(),
            patient_name: claim.patient_name.clone(),
            date_of_service: claim.date_of_service.clone(),
            provider: claim.provider.clone(),
            payer: claim.payer.clone(),
            carc_code: carc_from_denial_code(claim.denial_code.as_deref().unwrap_or_default()),
            rarc_code: rarc_code.to_string(),
            denial_reason: claim.denial_reason.clone(),
            resolution_steps: RESOLUTION_STEPS.iter().map(|s| s.to_string()).collect(),
            billed_amount: claim.billed_amount,
            eob_reference: claim.eob_reference.clone(),
        }
    }
}

/// Strips the group-code prefix ("CO", "PR", "OA", ...) from a denial code,
/// leaving the CARC number: `CO252` → `252`.
pub fn carc_from_denial_code(code: &str) -> String {
    code.trim()
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .to_string()
}

/// Renders an amount the way the queue displays it: `$1,250.00`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(code: Option<&str>) -> Claim {
        Claim {
            claim_id: "440553".into(),
            patient_name: "Joel Ross".into(),
            date_of_service: "2024-10-23".into(),
            provider: "Voyage Medical Solutions LLC".into(),
            payer: "Blue Cross Blue Shield".into(),
            denial_code: code.map(str::to_string),
            denial_reason: "Additional documentation needed".into(),
            billed_amount: 2000.0,
            eob_reference: None,
            status: ClaimStatus::Pending,
        }
    }

    #[test]
    fn carc_strips_group_prefix() {
        assert_eq!(carc_from_denial_code("CO252"), "252");
        assert_eq!(carc_from_denial_code("PR1"), "1");
        assert_eq!(carc_from_denial_code(" CO16 "), "16");
        assert_eq!(carc_from_denial_code(""), "");
    }

    #[test]
    fn workflow_data_projection() {
        let data = ClaimWorkflowData::from_claim(&claim(Some("CO252")), "M127");
        assert_eq!(data.claim_id, "440553");
        assert_eq!(data.carc_code, "252");
        assert_eq!(data.rarc_code, "M127");
        assert_eq!(data.resolution_steps.len(), 6);
        assert!(data.eob_reference.is_none());
    }

    #[test]
    fn denial_code_matching() {
        assert!(claim(Some("CO252")).has_denial_code("CO252"));
        assert!(!claim(Some("CO16")).has_denial_code("CO252"));
        assert!(!claim(None).has_denial_code("CO252"));
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ClaimStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(ClaimStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(2000.0), "$2,000.00");
        assert_eq!(format_currency(1250.5), "$1,250.50");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
    }
}
