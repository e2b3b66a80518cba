//! Claim list ingestion.
//!
//! Columns are matched by case-insensitive substring against the header row,
//! so "Claim ID", "claim_id" and "Claim Number" all resolve to the claim
//! identifier. Cells may be double-quoted to embed commas.

use std::collections::HashSet;

use chrono::Local;
use tracing::debug;

use super::record::{Claim, ClaimStatus};
use crate::error::UploadError;

/// Column positions resolved once from the header row.
#[derive(Debug, Default)]
struct Columns {
    claim_id: Option<usize>,
    patient: Option<usize>,
    date_of_service: Option<usize>,
    provider: Option<usize>,
    payer: Option<usize>,
    denial_code: Option<usize>,
    denial_reason: Option<usize>,
    amount: Option<usize>,
    eob: Option<usize>,
}

impl Columns {
    fn resolve(headers: &[String]) -> Result<Self, UploadError> {
        let find = |pred: &dyn Fn(&str) -> bool| headers.iter().position(|h| pred(h));

        let columns = Self {
            claim_id: find(&|h| h.contains("claim")),
            patient: find(&|h| h.contains("patient")),
            date_of_service: find(&|h| h.contains("dos") || h.contains("date")),
            provider: find(&|h| h.contains("provider")),
            payer: find(&|h| h.contains("payer")),
            denial_code: find(&|h| h.contains("denial") && h.contains("code")),
            denial_reason: find(&|h| h.contains("denial") && h.contains("reason")),
            amount: find(&|h| h.contains("amount") || h.contains("billed")),
            eob: find(&|h| h.contains("eob")),
        };

        let required = [
            ("claim id", columns.claim_id),
            ("denial code", columns.denial_code),
            ("denial reason", columns.denial_reason),
            ("eob availability", columns.eob),
        ];
        for (name, idx) in required {
            if idx.is_none() {
                return Err(UploadError::MissingColumn(name));
            }
        }

        Ok(columns)
    }
}

/// Parses an uploaded claim list.
///
/// Rows with fewer cells than the header are skipped. When
/// `fallback_denial_code` is `None`, rows with an empty denial code are kept
/// but left unclassified; otherwise they take the fallback code.
pub fn parse_claims(
    content: &str,
    fallback_denial_code: Option<&str>,
) -> Result<Vec<Claim>, UploadError> {
    // Row numbers are 1-based file lines counted after the header, blank lines included.
    let lines: Vec<(usize, &str)> = content
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, l)| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(UploadError::TooFewRows);
    }

    let (header_line, header) = lines[0];
    let headers: Vec<String> = split_record(header)
        .into_iter()
        .map(|h| h.to_lowercase())
        .collect();
    let columns = Columns::resolve(&headers)?;
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();

    let mut claims = Vec::new();
    let mut seen = HashSet::new();
    for &(line_no, line) in &lines[1..] {
        let row = line_no - header_line;
        let values = split_record(line);
        if values.len() < headers.len() {
            debug!(row, cells = values.len(), "skipping short row");
            continue;
        }

        let cell = |idx: Option<usize>| -> Option<&str> {
            idx.and_then(|i| values.get(i))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        let denial_code = cell(columns.denial_code)
            .map(str::to_string)
            .or_else(|| fallback_denial_code.map(str::to_string));

        let claim_id = cell(columns.claim_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("CLM-{row}"));
        if !seen.insert(claim_id.clone()) {
            return Err(UploadError::DuplicateClaimId { row, claim_id });
        }

        claims.push(Claim {
            claim_id,
            patient_name: cell(columns.patient).unwrap_or("Unknown Patient").to_string(),
            date_of_service: cell(columns.date_of_service)
                .map(str::to_string)
                .unwrap_or_else(|| today.clone()),
            provider: cell(columns.provider).unwrap_or("Unknown Provider").to_string(),
            payer: cell(columns.payer).unwrap_or("Unknown Payer").to_string(),
            denial_code,
            denial_reason: cell(columns.denial_reason)
                .unwrap_or("Additional documentation required")
                .to_string(),
            billed_amount: parse_amount(cell(columns.amount), row)?,
            eob_reference: cell(columns.eob)
                .filter(|v| !v.eq_ignore_ascii_case("n/a"))
                .map(str::to_string),
            status: ClaimStatus::Pending,
        });
    }

    if claims.is_empty() {
        return Err(UploadError::NoClaims);
    }
    Ok(claims)
}

fn parse_amount(raw: Option<&str>, row: usize) -> Result<f64, UploadError> {
    let Some(raw) = raw else {
        return Ok(0.0);
    };
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(UploadError::InvalidAmount {
            row,
            value: raw.to_string(),
        }),
    }
}

/// Splits one comma-separated record, honouring double quotes and `""`
/// escapes. Cells are trimmed.
fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Validates the name of an uploaded file against the expected extension.
pub fn check_extension(name: &str, extension: &'static str) -> Result<(), UploadError> {
    let matches = name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension));
    if matches {
        Ok(())
    } else {
        Err(UploadError::WrongFileType {
            expected: extension,
            name: name.to_string(),
        })
    }
}
