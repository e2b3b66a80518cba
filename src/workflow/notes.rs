use super::state::WorkflowState;

/// Builds the case-notes draft offered when submission finishes.
///
/// Returns an empty string when no claim is attached.
pub fn draft_case_notes(state: &WorkflowState) -> String {
    let Some(claim) = state.claim() else {
        return String::new();
    };

    let steps = claim
        .resolution_steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let mut documents = state
        .selected_documents()
        .map(|d| format!("  - {}", d.name))
        .collect::<Vec<_>>()
        .join("\n");
    if documents.is_empty() {
        documents = "  - No documents selected".to_string();
    }

    format!(
        "CLAIM RESOLUTION SUMMARY\n\
         ========================\n\
         \n\
         Claim ID: {id}\n\
         Patient: {patient}\n\
         Date of Service: {dos}\n\
         Provider: {provider}\n\
         Payer: {payer}\n\
         \n\
         DENIAL INFORMATION\n\
         ------------------\n\
         CARC Code: {carc}\n\
         RARC Code: {rarc}\n\
         Denial Reason: {reason}\n\
         \n\
         RECOMMENDED RESOLUTION STEPS\n\
         ----------------------------\n\
         {steps}\n\
         \n\
         EXECUTION SUMMARY\n\
         -----------------\n\
         1. Retrieved medical record documents from PMS portal\n\
         2. Documents verified for relevance, completeness, and correctness\n\
         3. Documents merged into single PDF for submission\n\
         4. Merged PDF uploaded to {payer} payer portal\n\
         5. Case ID snapshot captured as proof of submission\n\
         6. All documents submitted to PMS portal under Appeals category\n\
         \n\
         DOCUMENTS INCLUDED\n\
         ------------------\n\
         {documents}\n\
         \n\
         ADDITIONAL NOTES\n\
         ----------------\n",
        id = claim.claim_id,
        patient = claim.patient_name,
        dos = claim.date_of_service,
        provider = claim.provider,
        payer = claim.payer,
        carc = claim.carc_code,
        rarc = claim.rarc_code,
        reason = claim.denial_reason,
    )
}
