//! CLI command implementations for job processing and timeline inspection.
//!
//! Each `run_*` function backs one `casefolio` subcommand. Results go to
//! stdout; progress and warnings go to stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::client::{Backend, HttpBackend};
use crate::config::Config;
use crate::export::{build_export, write_export};
use crate::filter::{filter_events, EventFilter};
use crate::models::{EventId, FactId, JobId, JobStatus};
use crate::navigator::{AnchorNavigator, AnchorOutcome, TerminalRenderer};
use crate::progress::ProgressMode;
use crate::reconcile::{reconcile, Reconciliation};
use crate::resume::ResumeFile;
use crate::session::{Session, SessionSettings};
use crate::store::Store;

fn backend(config: &Config) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(HttpBackend::from_config(config)?))
}

fn session(config: &Config, progress: ProgressMode) -> Result<Session> {
    Ok(Session::with_reporter(
        backend(config)?,
        SessionSettings::from(config),
        progress.reporter(),
        Some(ResumeFile::in_dir(&config.state.dir)),
    ))
}

/// Submit a file, poll it to completion, and print the timeline.
pub async fn run_process(
    config: &Config,
    file: &Path,
    case_id: Option<String>,
    name: Option<String>,
    filter: &EventFilter,
    progress: ProgressMode,
) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let document_name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.txt".to_string())
    });
    let case_id = case_id.unwrap_or_else(|| "default".to_string());

    let mut session = session(config, progress)?;
    let job_id = session
        .upload(&case_id, &document_name, &content)
        .await?;
    println!("job_id: {}", job_id);

    finish(&session).await?;
    print_timeline(&session.store(), filter);
    Ok(())
}

/// Continue polling the job recorded by a previous run.
pub async fn run_resume(config: &Config, filter: &EventFilter, progress: ProgressMode) -> Result<()> {
    let resume = ResumeFile::in_dir(&config.state.dir);
    let Some(state) = resume.load() else {
        println!("Nothing to resume.");
        return Ok(());
    };

    println!(
        "Resuming job {} (page {}, saved {})",
        state.job_id,
        state.current_page,
        state.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    let mut session = session(config, progress)?;
    session.watch_from_page(state.job_id, state.current_page);
    finish(&session).await?;
    print_timeline(&session.store(), filter);
    Ok(())
}

async fn finish(session: &Session) -> Result<()> {
    match session.wait().await {
        Some(Ok(_)) => {}
        Some(Err(e)) => {
            let message = session
                .notification()
                .map(|n| n.message)
                .unwrap_or_else(|| e.to_string());
            bail!("{}", message);
        }
        None => bail!("polling was cancelled before the job finished"),
    }
    for diagnostic in session.diagnostics() {
        eprintln!("Warning: {}", diagnostic);
    }
    Ok(())
}

/// Issue a single status request and print the job's state.
pub async fn run_status(config: &Config, job_id: &str) -> Result<()> {
    let job_id = JobId::new(job_id);
    let response = backend(config)?.job_status(&job_id).await?;
    let snapshot = response.snapshot(&job_id);

    println!("job_id:   {}", snapshot.id);
    println!("state:    {}", snapshot.status);
    if let Some(p) = &snapshot.progress {
        println!("progress: {} / {}", p.current, p.total);
        if let Some(message) = &p.message {
            println!("message:  {}", message);
        }
    }
    if let Some(error) = &snapshot.error {
        println!("error:    {}", error);
    }
    Ok(())
}

/// Fetch a completed job's result and reconcile it.
pub async fn fetch_completed(backend: &dyn Backend, job_id: &JobId) -> Result<Reconciliation> {
    let response = backend.job_status(job_id).await?;
    let snapshot = response.snapshot(job_id);
    match snapshot.status {
        JobStatus::Completed => {
            let payload = response
                .result
                .with_context(|| format!("job {} completed without a result", job_id))?;
            Ok(reconcile(&payload))
        }
        JobStatus::Failed => bail!(
            "job {} failed: {}",
            job_id,
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        other => bail!("job {} is not finished yet (state: {})", job_id, other),
    }
}

async fn load_store(config: &Config, job_id: &str) -> Result<Store> {
    let reconciliation = fetch_completed(backend(config)?.as_ref(), &JobId::new(job_id)).await?;
    for diagnostic in &reconciliation.diagnostics {
        eprintln!("Warning: {}", diagnostic);
    }
    Ok(reconciliation.store)
}

pub async fn run_timeline(config: &Config, job_id: &str, filter: &EventFilter) -> Result<()> {
    let store = load_store(config, job_id).await?;
    print_timeline(&store, filter);
    Ok(())
}

pub async fn run_anchor(
    config: &Config,
    job_id: &str,
    fact: Option<String>,
    event: Option<String>,
) -> Result<()> {
    let store = load_store(config, job_id).await?;
    let mut navigator =
        AnchorNavigator::new(std::time::Duration::from_millis(config.anchor.budget_ms));
    let mut renderer = TerminalRenderer;

    let outcome = match (fact, event) {
        (Some(fact), None) => navigator.anchor_to_fact(&store, &mut renderer, &FactId::new(fact)),
        (None, Some(event)) => {
            navigator.anchor_to_event(&store, &mut renderer, &EventId::new(event))
        }
        _ => bail!("exactly one of --fact or --event is required"),
    };

    match outcome {
        AnchorOutcome::Navigated { .. } => {}
        AnchorOutcome::FactNotFound => println!("fact not found"),
        AnchorOutcome::EventNotFound => println!("event not found"),
    }
    Ok(())
}

pub async fn run_export(
    config: &Config,
    job_id: &str,
    case_name: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let store = load_store(config, job_id).await?;
    let case_name = case_name
        .or_else(|| store.document_name().map(str::to_string))
        .unwrap_or_else(|| job_id.to_string());
    let export = build_export(&store, &case_name, chrono::Utc::now());
    write_export(&export, output)
}

/// Print events (filtered) and contradictions (most severe first).
pub fn print_timeline(store: &Store, filter: &EventFilter) {
    let events = filter_events(store, filter);
    let conflicted = store.conflicted_event_ids();

    if let Some(name) = store.document_name() {
        println!("document: {}", name);
    }
    println!(
        "facts: {}  events: {}  contradictions: {}  filter: {}",
        store.fact_count(),
        store.events().len(),
        store.contradictions().len(),
        filter
    );
    println!();

    if events.is_empty() {
        println!("No events.");
    }
    for event in &events {
        let marker = if conflicted.contains(&event.id) { "!" } else { " " };
        println!(
            "{} {:<10}  {:<6}  {:<13}  {}",
            marker,
            event.date.format("%Y-%m-%d"),
            event.id,
            event.category.as_deref().unwrap_or("-"),
            event.description
        );
    }

    let mut contradictions: Vec<_> = store.contradictions().iter().collect();
    contradictions.sort_by(|a, b| b.severity.cmp(&a.severity));
    if !contradictions.is_empty() {
        println!();
        println!("Contradictions:");
    }
    for c in contradictions {
        let missing = [&c.event1_id, &c.event2_id]
            .into_iter()
            .filter(|id| store.event(id).is_none())
            .count();
        let note = if missing > 0 { "  (event missing)" } else { "" };
        println!(
            "  [{:<6}] {} <-> {}  {}{}",
            c.severity, c.event1_id, c.event2_id, c.explanation, note
        );
    }
}
