//! Terminal output: spinners for running sub-steps and coloured summaries.
//!
//! [`LogRenderer`] follows the activity log as the session changes it. The
//! `print_*` functions render one-shot views for the CLI commands.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::claims::{Claim, ClaimStatus, Cohorts, QueueStats, format_currency};
use crate::session::{RunOutcome, SessionObserver};
use crate::workflow::{ClaimOutcome, LogEntry, LogStatus, Phase, WorkflowState};

/// Renders activity log entries as they are appended and settled.
///
/// The newest `running` entry is shown as a spinner; once it settles it is
/// replaced by a green ✓ or red ✗ line.
pub struct LogRenderer {
    pb: Option<ProgressBar>,
    // Entries already printed as settled lines.
    printed: usize,
    claim_id: Option<String>,
    phase: Option<Phase>,
    green: Style,
    red: Style,
    bold: Style,
}

impl LogRenderer {
    /// Starts rendering after whatever `workflow` already holds.
    pub fn new(workflow: &WorkflowState) -> Self {
        Self {
            pb: None,
            printed: workflow.log().len(),
            claim_id: workflow.claim().map(|c| c.claim_id.clone()),
            phase: Some(workflow.phase()),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            bold: Style::new().bold(),
        }
    }

    fn spinner(&mut self, message: &str) {
        let pb = self.pb.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        pb.set_message(message.to_string());
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
    }

    fn settled_line(&self, entry: &LogEntry) -> String {
        match entry.status {
            LogStatus::Success => format!("  {} {}", self.green.apply_to("✓"), entry.message),
            LogStatus::Error => format!("  {} {}", self.red.apply_to("✗"), entry.message),
            LogStatus::Running => format!("  … {}", entry.message),
        }
    }
}

impl SessionObserver for LogRenderer {
    fn workflow_changed(&mut self, workflow: &WorkflowState) {
        let claim_id = workflow.claim().map(|c| c.claim_id.clone());
        let entries = workflow.log().entries();
        if claim_id != self.claim_id || entries.len() < self.printed {
            self.clear_spinner();
            self.printed = 0;
            self.phase = None;
            self.claim_id = claim_id;
        }

        if self.phase != Some(workflow.phase()) {
            self.clear_spinner();
            // Flush entries from the previous phase before the new header.
            while self.printed < entries.len() && entries[self.printed].status != LogStatus::Running
            {
                println!("{}", self.settled_line(&entries[self.printed]));
                self.printed += 1;
            }
            println!();
            println!("{}", self.bold.apply_to(format!("── {} ──", workflow.phase().title())));
            self.phase = Some(workflow.phase());
        }

        for entry in &entries[self.printed..] {
            if entry.status == LogStatus::Running {
                self.spinner(&entry.message);
                return;
            }
            self.clear_spinner();
            println!("{}", self.settled_line(entry));
            self.printed += 1;
        }
        self.clear_spinner();
    }
}

impl Drop for LogRenderer {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

fn status_style(status: ClaimStatus) -> Style {
    match status {
        ClaimStatus::Pending => Style::new().dim(),
        ClaimStatus::InProgress => Style::new().yellow(),
        ClaimStatus::Completed => Style::new().green(),
        ClaimStatus::Failed => Style::new().red(),
    }
}

fn print_claim_rows(claims: &[Claim], next: Option<&str>) {
    if claims.is_empty() {
        println!("    (none)");
        return;
    }
    for claim in claims {
        let marker = if Some(claim.claim_id.as_str()) == next { "→" } else { " " };
        println!(
            "  {marker} {:<10} {:<18} {:<24} {:>12}  {}",
            claim.claim_id,
            claim.patient_name,
            claim.payer,
            format_currency(claim.billed_amount),
            status_style(claim.status).apply_to(claim.status),
        );
    }
}

/// The claims queue: counts, then both cohorts with the next claim marked.
pub fn print_queue(stats: &QueueStats, cohorts: &Cohorts, denial_code: &str) {
    let bold = Style::new().bold();
    println!(
        "{} claims uploaded, {} with denial code {denial_code}",
        stats.total_uploaded, stats.total_targeted
    );
    if cohorts.is_empty() {
        println!("No claims with denial code {denial_code} in this upload.");
        return;
    }
    println!(
        "Processed {} of {}",
        stats.completed_with_eob + stats.completed_without_eob,
        stats.with_eob + stats.without_eob
    );

    println!();
    println!(
        "{} ({} of {} processed)",
        bold.apply_to("Claims with EOB"),
        stats.completed_with_eob,
        stats.with_eob
    );
    print_claim_rows(&cohorts.with_eob, stats.next_with_eob.as_deref());

    println!();
    println!(
        "{} ({} of {} processed, EOB upload required)",
        bold.apply_to("Claims without EOB"),
        stats.completed_without_eob,
        stats.without_eob
    );
    print_claim_rows(&cohorts.without_eob, stats.next_without_eob.as_deref());
}

/// Every log entry of the current workflow.
pub fn print_log(workflow: &WorkflowState) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let cyan = Style::new().cyan();
    if workflow.log().is_empty() {
        println!("No activity yet.");
        return;
    }
    for entry in workflow.log().entries() {
        let icon = match entry.status {
            LogStatus::Success => green.apply_to("✓"),
            LogStatus::Error => red.apply_to("✗"),
            LogStatus::Running => cyan.apply_to("…"),
        };
        println!(
            "  {icon} {} {}",
            Style::new().dim().apply_to(entry.recorded_at.format("%H:%M:%S")),
            entry.message
        );
    }
    let errors = workflow.log().count_with_status(LogStatus::Error);
    if errors > 0 {
        println!("  {}", red.apply_to(format!("{errors} failed sub-step(s)")));
    }
}

/// Summary of the active claim and what the current phase is waiting for.
pub fn print_workflow(workflow: &WorkflowState, position: Option<(usize, usize)>) {
    let bold = Style::new().bold();
    let Some(claim) = workflow.claim() else {
        println!("No active claim.");
        return;
    };

    match position {
        Some((n, m)) => println!("{}", bold.apply_to(format!("Claim {n} of {m}: {}", claim.claim_id))),
        None => println!("{}", bold.apply_to(format!("Claim {}", claim.claim_id))),
    }
    println!(
        "  {} · {} · DOS {} · {}",
        claim.patient_name,
        claim.payer,
        claim.date_of_service,
        format_currency(claim.billed_amount)
    );
    println!(
        "  CARC {} / RARC {}: {}",
        claim.carc_code, claim.rarc_code, claim.denial_reason
    );
    println!("  Phase: {} ({})", workflow.phase().title(), workflow.phase());
    println!();

    match workflow.phase() {
        Phase::NbaApproval => {
            println!("{}", bold.apply_to("Recommended resolution steps"));
            for (i, step) in claim.resolution_steps.iter().enumerate() {
                println!("  {}. {step}", i + 1);
            }
            println!();
            println!("Run `claimdesk approve` or `claimdesk reject`.");
        }
        Phase::DocReview => {
            print_documents(workflow);
            println!();
            println!(
                "Run `claimdesk toggle <id>`, `claimdesk select-all`, then `claimdesk confirm` \
                 (or `claimdesk not-relevant`)."
            );
        }
        Phase::Smartsheets => {
            println!("Client communication opened in Smartsheets.");
            println!("Run `claimdesk return` to review documents again or `claimdesk escalate`.");
        }
        Phase::MergeReview => {
            let count = workflow.selected_document_ids().len();
            println!("Merged PDF ({count} documents): {}", workflow.merged_artifact().unwrap_or("-"));
            println!("Run `claimdesk approve` to submit or `claimdesk reject` to reselect.");
        }
        Phase::CaseNotes => {
            println!("{}", workflow.case_notes());
            println!("Run `claimdesk notes [TEXT]` to submit (empty keeps the draft above).");
        }
        Phase::Completed => {
            println!("{} Claim resolved. Run `claimdesk next`.", Style::new().green().bold().apply_to("✓"));
        }
        Phase::ManualFlow => {
            println!(
                "{} Claim handed to manual flow. Run `claimdesk back`.",
                Style::new().yellow().bold().apply_to("!")
            );
        }
        phase if phase.is_automatic() => {
            println!("Interrupted while {}. Run `claimdesk resume`.", phase.title().to_lowercase());
        }
        _ => {}
    }
}

pub fn print_documents(workflow: &WorkflowState) {
    let bold = Style::new().bold();
    println!(
        "{} ({} selected)",
        bold.apply_to("Retrieved documents"),
        workflow.selected_document_ids().len()
    );
    for doc in workflow.documents() {
        let mark = if workflow.is_selected(&doc.id) { "[x]" } else { "[ ]" };
        println!(
            "  {mark} {:>2}  {:<22} {:<16} {:<20} {}",
            doc.id, doc.name, doc.category, doc.date, doc.code
        );
    }
}

/// One line describing where an automatic run stopped.
pub fn print_outcome(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Checkpoint(phase) => {
            println!();
            println!("Waiting for review: {}", phase.title());
        }
        RunOutcome::Finished(ClaimOutcome::Resolved) => {
            println!("  {} Claim resolved", Style::new().green().bold().apply_to("✓"));
        }
        RunOutcome::Finished(ClaimOutcome::Manual) => {
            println!("  {} Reverted to manual flow", Style::new().yellow().bold().apply_to("!"));
        }
        RunOutcome::Cancelled(phase) => {
            println!(
                "  {} Cancelled during {}. Run `claimdesk resume` to restart it.",
                Style::new().red().bold().apply_to("✗"),
                phase.title().to_lowercase()
            );
        }
    }
}
