//! Command-line interface built on clap.
//!
//! Each [`Command`] is one user action against the persisted session.
//! Global flags override the state directory, skip simulated delays, seed
//! the failure simulation, and enable debug logging.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// claimdesk: step through claim-denial resolution workflows.
#[derive(Debug, Parser)]
#[command(name = "claimdesk", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the session snapshot.
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Skip simulated delays.
    #[arg(long, global = true, default_value_t = false)]
    pub fast: bool,

    /// Seed for the submission failure simulation.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Enable debug logging on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in.
    Login { username: String, password: String },

    /// Upload a claim list (CSV).
    Upload {
        /// Path to the CSV file.
        #[arg(required_unless_present = "sample", conflicts_with = "sample")]
        file: Option<PathBuf>,

        /// Load the built-in sample batch instead of a file.
        #[arg(long)]
        sample: bool,
    },

    /// Show the claims queue.
    Queue,

    /// Attach an EOB (PDF) to a claim and start its workflow.
    Eob { claim_id: String, file: PathBuf },

    /// Start the workflow for a claim that has an EOB.
    Start { claim_id: String },

    /// Approve the recommended steps or the merged PDF.
    Approve,

    /// Reject the recommended steps or the merged PDF.
    Reject,

    /// Select or deselect a retrieved document.
    Toggle { document_id: String },

    /// Select every retrieved document.
    SelectAll,

    /// Confirm the selected documents.
    Confirm,

    /// Mark the retrieved documents as not relevant.
    NotRelevant,

    /// Return from Smartsheets to document review.
    Return,

    /// Hand the claim to manual flow from Smartsheets.
    Escalate,

    /// Submit case notes. Without text or file the draft is kept.
    Notes {
        text: Option<String>,

        /// Read the notes from a file.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Mark the completed claim and return to the queue.
    Next,

    /// Return to the queue.
    Back,

    /// Restart an interrupted automatic phase.
    Resume,

    /// Show the current screen, claim and activity log.
    Status,

    /// Sign out and clear the stored session.
    Logout,

    /// Run the whole sample flow in memory.
    Demo,
}
