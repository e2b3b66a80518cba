//! Static demo data: the resolution playbook, the documents "found" in the
//! PMS portal, and a sample claim batch.

use crate::claims::{Claim, ClaimStatus};
use crate::workflow::Document;

/// Recommended resolution steps for a CO-252 (additional documentation) denial.
pub const RESOLUTION_STEPS: [&str; 6] = [
    "Pull relevant MR (Medical Record) documents from PMS portal",
    "Verify documents for relevance, completeness and correctness",
    "Merge the verified documents into a single PDF",
    "Upload merged documents to payer portal",
    "Take Case ID snapshot (proof of documents uploaded) from payer portal",
    "Submit merged documents, Case ID snapshot and notes to PMS portal under 'Appeals' category in document tab",
];

const PORTAL_PROVIDER: &str = "Voyage Medical Solutions LLC";

/// Documents returned by the simulated PMS retrieval.
pub fn retrieved_documents() -> Vec<Document> {
    let rows: [(&str, &str, &str, &str, &str); 8] = [
        ("1", "C. NOTES - E0676", "Chart Notes", "10/23/2025 9:48 AM", "E0676"),
        ("2", "CHART NOTES - L1852", "Chart Notes", "07/21/2023 2:44 PM", "L1852"),
        ("3", "Chart Notes", "Chart Notes", "02/23/2022 3:00 PM", "L1852"),
        ("4", "DT - E0676", "Delivery Ticket", "10/23/2025 9:48 AM", "E0676"),
        ("5", "Delivery Ticket", "Delivery Ticket", "12/05/2023 2:03 PM", "E0676"),
        ("6", "Delivery Ticket", "Delivery Ticket", "08/16/2023 9:54 AM", "E0673"),
        ("7", "POD", "Delivery Ticket", "08/01/2023 7:56 AM", "POD"),
        ("8", "L1852 X 1 L2397 X 2", "Delivery Ticket", "03/21/2022 10:47 AM", "L1852"),
    ];

    rows.into_iter()
        .map(|(id, name, category, date, code)| Document {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            date: date.to_string(),
            code: code.to_string(),
            provider: PORTAL_PROVIDER.to_string(),
        })
        .collect()
}

/// Five-claim batch used by `upload --sample` and the demo: four CO252
/// claims (two without EOB) and one CO16 claim outside the work queue.
pub fn sample_claims() -> Vec<Claim> {
    const DOCS_NEEDED: &str =
        "Additional documentation/information is needed to process this claim.";
    let rows: [(&str, &str, &str, &str, &str, f64, bool); 5] = [
        ("440553", "Joel Ross", "2024-10-23", "Blue Cross Blue Shield", "CO252", 2000.0, true),
        ("440554", "Sarah Mitchell", "2024-10-15", "Aetna", "CO252", 3500.0, true),
        ("440555", "Michael Chen", "2024-10-20", "United Healthcare", "CO252", 1250.0, false),
        ("440556", "Emily Johnson", "2024-10-18", "Cigna", "CO252", 4200.0, false),
        ("440557", "David Williams", "2024-10-12", "Humana", "CO16", 1800.0, true),
    ];

    rows.into_iter()
        .map(|(id, patient, dos, payer, code, amount, has_eob)| Claim {
            claim_id: id.to_string(),
            patient_name: patient.to_string(),
            date_of_service: dos.to_string(),
            provider: PORTAL_PROVIDER.to_string(),
            payer: payer.to_string(),
            denial_code: Some(code.to_string()),
            denial_reason: if code == "CO16" {
                "Claim/service lacks information or has submission/billing error(s).".to_string()
            } else {
                DOCS_NEEDED.to_string()
            },
            billed_amount: amount,
            eob_reference: has_eob.then(|| format!("https://example.com/eob/{id}.pdf")),
            status: ClaimStatus::Pending,
        })
        .collect()
}
