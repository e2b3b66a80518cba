mod claims;
mod cli;
mod config;
mod error;
mod fixtures;
mod persistence;
mod session;
mod ui;
mod workflow;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::ClaimdeskConfig;
use persistence::{FileCache, PersistenceAdapter};
use session::{RunOutcome, Screen, Session};
use workflow::{
    CancelToken, ClaimOutcome, Pacing, Phase, RandomFailures, Simulator, WorkflowAction,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {e:#}", Style::new().red().bold().apply_to("✗"));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("claimdesk=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClaimdeskConfig::load().context("loading claimdesk.toml")?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if cli.fast {
        config.delay_scale = 0.0;
    }
    debug!(state_dir = %config.state_dir.display(), delay_scale = config.delay_scale, "configuration loaded");

    let persistence = PersistenceAdapter::new(Box::new(FileCache::new(&config.state_dir)));
    let simulator = build_simulator(&config, cli.seed);
    let mut session = Session::open(config, persistence, simulator);
    let renderer = ui::LogRenderer::new(session.workflow());
    session.set_observer(Box::new(renderer));
    watch_ctrl_c(session.cancel_token());

    dispatch(&mut session, cli.command, cli.seed).await
}

fn build_simulator(config: &ClaimdeskConfig, seed: Option<u64>) -> Simulator {
    let pacing = if config.delay_scale == 0.0 {
        Pacing::Instant
    } else {
        Pacing::Realtime {
            scale: config.delay_scale,
        }
    };
    let probabilities = config.submission.failure_probabilities.clone();
    let failures = match seed {
        Some(seed) => RandomFailures::seeded(probabilities, seed),
        None => RandomFailures::new(probabilities),
    };
    Simulator::new(pacing, Box::new(failures), config.submission.max_attempts)
}

/// Cancels the running simulation on the first Ctrl-C.
fn watch_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current sub-step");
            token.cancel();
        }
    });
}

async fn dispatch(session: &mut Session, command: Command, seed: Option<u64>) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            session.login(&username, &password)?;
            println!("Signed in as {}. Upload a claim list with `claimdesk upload`.", username.trim());
        }
        Command::Upload { file, sample } => {
            let queued = if sample {
                session.upload_claims(fixtures::sample_claims())?
            } else {
                let path = file.context("no claim file given")?;
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                session.upload_csv(&content)?
            };
            println!("{queued} claims in the work queue.");
            println!();
            show_queue(session);
        }
        Command::Queue => show_queue(session),
        Command::Eob { claim_id, file } => {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let outcome = session.attach_eob(&claim_id, &name).await?;
            report(session, outcome);
        }
        Command::Start { claim_id } => {
            let outcome = session.start_claim(&claim_id).await?;
            report(session, outcome);
        }
        Command::Approve => act(session, WorkflowAction::Approve).await?,
        Command::Reject => act(session, WorkflowAction::Reject).await?,
        Command::Toggle { document_id } => {
            session.act(WorkflowAction::ToggleDocument(document_id)).await?;
            ui::print_documents(session.workflow());
        }
        Command::SelectAll => {
            session.act(WorkflowAction::SelectAll).await?;
            ui::print_documents(session.workflow());
        }
        Command::Confirm => act(session, WorkflowAction::ConfirmDocuments).await?,
        Command::NotRelevant => act(session, WorkflowAction::MarkNotRelevant).await?,
        Command::Return => act(session, WorkflowAction::ReturnFromSmartsheets).await?,
        Command::Escalate => act(session, WorkflowAction::EscalateToManual).await?,
        Command::Notes { text, file } => {
            let notes = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => String::new(),
            };
            act(session, WorkflowAction::SubmitCaseNotes(notes)).await?;
        }
        Command::Next => {
            session.next_claim()?;
            show_queue(session);
        }
        Command::Back => {
            session.back_to_queue()?;
            show_queue(session);
        }
        Command::Resume => {
            let outcome = session.resume().await?;
            report(session, outcome);
        }
        Command::Status => show_status(session),
        Command::Logout => {
            session.logout();
            println!("Signed out.");
        }
        Command::Demo => {
            let config = session.config().clone();
            run_demo(config, seed).await?;
        }
    }
    Ok(())
}

async fn act(session: &mut Session, action: WorkflowAction) -> Result<()> {
    let outcome = session.act(action).await?;
    report(session, outcome);
    Ok(())
}

fn report(session: &Session, outcome: RunOutcome) {
    ui::print_outcome(outcome);
    if matches!(outcome, RunOutcome::Checkpoint(_)) {
        println!();
        ui::print_workflow(session.workflow(), session.current_position());
    }
}

fn show_queue(session: &Session) {
    ui::print_queue(
        &session.queue_stats(),
        &session.app().cohorts,
        &session.config().target_denial_code,
    );
}

fn show_status(session: &Session) {
    let app = session.app();
    match &app.user {
        Some(user) => println!("Signed in as {} · screen: {}", user.username, app.screen),
        None => {
            println!("Not signed in. Run `claimdesk login <user> <password>`.");
            return;
        }
    }
    println!();
    match app.screen {
        Screen::Login | Screen::ClaimsUpload => {
            println!("No claim list yet. Run `claimdesk upload <file>` or `claimdesk upload --sample`.");
        }
        Screen::ClaimsQueue => show_queue(session),
        Screen::EobUpload => {
            let target = app.eob_target.as_deref().unwrap_or("-");
            println!("Waiting for an EOB for claim {target}. Run `claimdesk eob {target} <file.pdf>`.");
        }
        Screen::Workflow => {
            ui::print_workflow(session.workflow(), session.current_position());
            println!();
            ui::print_log(session.workflow());
        }
    }
}

/// Works every queued sample claim end to end without persisting anything.
async fn run_demo(config: ClaimdeskConfig, seed: Option<u64>) -> Result<()> {
    let simulator = build_simulator(&config, seed);
    let mut session = Session::open(config, PersistenceAdapter::in_memory(), simulator);
    let renderer = ui::LogRenderer::new(session.workflow());
    session.set_observer(Box::new(renderer));
    watch_ctrl_c(session.cancel_token());

    session.login("demo", "demo")?;
    session.upload_claims(fixtures::sample_claims())?;
    show_queue(&session);

    loop {
        let stats = session.queue_stats();
        let outcome = if let Some(claim_id) = stats.next_with_eob {
            session.start_claim(&claim_id).await?
        } else if let Some(claim_id) = stats.next_without_eob {
            session.attach_eob(&claim_id, &format!("eob-{claim_id}.pdf")).await?
        } else {
            break;
        };

        match decide_until_done(&mut session, outcome).await? {
            RunOutcome::Finished(ClaimOutcome::Resolved) => session.next_claim()?,
            RunOutcome::Finished(ClaimOutcome::Manual) => session.back_to_queue()?,
            other => {
                ui::print_outcome(other);
                return Ok(());
            }
        }
    }

    println!();
    show_queue(&session);
    Ok(())
}

/// Answers every checkpoint the way a reviewer accepting each step would.
async fn decide_until_done(session: &mut Session, mut outcome: RunOutcome) -> Result<RunOutcome> {
    let dim = Style::new().dim();
    loop {
        let RunOutcome::Checkpoint(phase) = outcome else {
            return Ok(outcome);
        };
        let action = match phase {
            Phase::NbaApproval | Phase::MergeReview => WorkflowAction::Approve,
            Phase::DocReview if session.workflow().selected_document_ids().is_empty() => {
                WorkflowAction::SelectAll
            }
            Phase::DocReview => WorkflowAction::ConfirmDocuments,
            Phase::CaseNotes => WorkflowAction::SubmitCaseNotes(String::new()),
            _ => WorkflowAction::EscalateToManual,
        };
        println!("  {}", dim.apply_to(format!("> {}", action.name())));
        outcome = session.act(action).await?;
    }
}
