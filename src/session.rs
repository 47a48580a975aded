//! One client session: the glue between the poller, the store, and the view.
//!
//! The session exclusively owns the current [`Store`] (through a
//! [`StoreHandle`]) and is the only writer to it. Writes happen in exactly
//! one place, when the active poll delivers a completed result, and always
//! replace the store wholesale.
//!
//! ```text
//! upload ──▶ Backend::submit ──▶ JobPoller ──▶ SessionCore (PollObserver)
//!                                                 │ reconcile + swap
//!                                                 ▼
//!                        anchor / filter / export ◀── Store snapshot
//! ```

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ResultPayload, SubmitRequest};
use crate::client::Backend;
use crate::config::Config;
use crate::export::{build_export, TimelineExport};
use crate::filter::{filter_events, EventFilter};
use crate::models::{Event, EventId, FactId, JobId, JobSnapshot};
use crate::navigator::{AnchorNavigator, AnchorOutcome, ViewRenderer};
use crate::poller::{JobPoller, PollError, PollObserver, PollerSettings};
use crate::progress::{JobProgressEvent, JobProgressReporter, NoProgress};
use crate::reconcile::{reconcile, Diagnostic};
use crate::resume::{ResumeFile, ResumeState};
use crate::store::{Store, StoreHandle};

/// A user-visible, dismissible message about a terminal failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Failure kind, as given by [`PollError::kind`].
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub poller: PollerSettings,
    pub anchor_budget: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            poller: PollerSettings::from(&config.polling),
            anchor_budget: Duration::from_millis(config.anchor.budget_ms),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::minimal())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    /// Job whose result is in the store.
    loaded_job: Option<JobId>,
    last_outcome: Option<Result<JobId, PollError>>,
    notification: Option<Notification>,
    diagnostics: Vec<Diagnostic>,
}

/// The part of the session the poller writes to.
struct SessionCore {
    store: StoreHandle,
    state: Mutex<SessionState>,
    reporter: Box<dyn JobProgressReporter>,
    resume: Option<ResumeFile>,
}

impl SessionCore {
    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PollObserver for SessionCore {
    fn on_progress(&self, snapshot: &JobSnapshot) {
        self.reporter
            .report(JobProgressEvent::from_snapshot(snapshot));
    }

    fn on_completed(&self, job_id: &JobId, payload: ResultPayload) {
        let reconciliation = reconcile(&payload);
        for diagnostic in &reconciliation.diagnostics {
            tracing::warn!(job_id = %job_id, %diagnostic, "reconciliation");
        }
        let store = reconciliation.store;
        tracing::info!(
            job_id = %job_id,
            facts = store.fact_count(),
            events = store.events().len(),
            contradictions = store.contradictions().len(),
            fingerprint = %store.fingerprint(),
            "store rebuilt"
        );

        self.store.replace(store);
        {
            let mut state = self.state();
            state.loaded_job = Some(job_id.clone());
            state.diagnostics = reconciliation.diagnostics;
            state.last_outcome = Some(Ok(job_id.clone()));
        }
        self.reporter.report(JobProgressEvent::Finished {
            job_id: job_id.clone(),
            ok: true,
        });
    }

    fn on_failed(&self, job_id: &JobId, error: PollError) {
        {
            let mut state = self.state();
            state.notification = Some(Notification {
                kind: error.kind(),
                message: error.to_string(),
            });
            state.last_outcome = Some(Err(error));
        }
        if let Some(resume) = &self.resume {
            resume.clear();
        }
        self.reporter.report(JobProgressEvent::Finished {
            job_id: job_id.clone(),
            ok: false,
        });
    }
}

pub struct Session {
    backend: Arc<dyn Backend>,
    core: Arc<SessionCore>,
    poller: JobPoller,
    navigator: AnchorNavigator,
    anchor_budget: Duration,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, settings: SessionSettings) -> Self {
        Self::with_reporter(backend, settings, Box::new(NoProgress), None)
    }

    pub fn with_reporter(
        backend: Arc<dyn Backend>,
        settings: SessionSettings,
        reporter: Box<dyn JobProgressReporter>,
        resume: Option<ResumeFile>,
    ) -> Self {
        let core = Arc::new(SessionCore {
            store: StoreHandle::new(),
            state: Mutex::new(SessionState::default()),
            reporter,
            resume,
        });
        let poller = JobPoller::new(
            Arc::clone(&backend),
            Arc::clone(&core) as Arc<dyn PollObserver>,
            settings.poller,
        );
        Self {
            backend,
            core,
            poller,
            navigator: AnchorNavigator::new(settings.anchor_budget),
            anchor_budget: settings.anchor_budget,
        }
    }

    /// Submit a document and start polling the new job.
    ///
    /// Any previous poll is cancelled and the previous store, notification,
    /// and diagnostics are discarded.
    pub async fn upload(
        &mut self,
        case_id: &str,
        document_name: &str,
        document_content: &str,
    ) -> Result<JobId> {
        self.reset();

        let request = SubmitRequest {
            case_id: case_id.to_string(),
            document_name: document_name.to_string(),
            document_content: document_content.to_string(),
        };
        let job_id = self.backend.submit(&request).await.map_err(|e| {
            let message = format!("upload failed: {}", e);
            self.core.state().notification = Some(Notification {
                kind: "transport",
                message: message.clone(),
            });
            anyhow::anyhow!(message)
        })?;

        tracing::info!(job_id = %job_id, document = document_name, "document submitted");
        self.core.reporter.report(JobProgressEvent::Submitted {
            job_id: job_id.clone(),
        });
        self.watch(job_id.clone());
        Ok(job_id)
    }

    /// Start polling an existing job (e.g. one recorded for resume).
    pub fn watch(&mut self, job_id: JobId) {
        self.watch_from_page(job_id, 1);
    }

    /// Like [`watch`](Self::watch), keeping `page` as the page on screen.
    pub fn watch_from_page(&mut self, job_id: JobId, page: u32) {
        self.navigator = AnchorNavigator::with_page(self.anchor_budget, page);
        {
            let mut state = self.core.state();
            state.last_outcome = None;
            state.notification = None;
        }
        if let Some(resume) = &self.core.resume {
            resume.save(&ResumeState::new(job_id.clone(), page));
        }
        self.poller.start_polling(job_id);
    }

    /// Cancel the active poll, if any. Idempotent.
    pub fn stop(&self) {
        self.poller.stop();
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.poller.active_job()
    }

    /// Wait for the active poll to finish and return how it ended.
    ///
    /// `None` means the poll was stopped or superseded before it reached a
    /// terminal state.
    pub async fn wait(&self) -> Option<Result<JobId, PollError>> {
        self.poller.join().await;
        let outcome = self.core.state().last_outcome.clone();
        if outcome.is_none() {
            tracing::debug!("poll ended without an outcome (cancelled)");
        }
        outcome
    }

    /// A consistent snapshot of the current store.
    pub fn store(&self) -> Arc<Store> {
        self.core.store.snapshot()
    }

    /// Job whose result is currently loaded.
    pub fn loaded_job(&self) -> Option<JobId> {
        self.core.state().loaded_job.clone()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.core.state().diagnostics.clone()
    }

    pub fn notification(&self) -> Option<Notification> {
        self.core.state().notification.clone()
    }

    pub fn dismiss_notification(&self) {
        self.core.state().notification = None;
    }

    pub fn filter_events(&self, filter: &EventFilter) -> Vec<Event> {
        let store = self.store();
        filter_events(&store, filter).into_iter().cloned().collect()
    }

    pub fn anchor_to_fact(
        &mut self,
        renderer: &mut dyn ViewRenderer,
        fact_id: &FactId,
    ) -> AnchorOutcome {
        let store = self.store();
        let outcome = self.navigator.anchor_to_fact(&store, renderer, fact_id);
        self.remember_page(outcome);
        outcome
    }

    pub fn anchor_to_event(
        &mut self,
        renderer: &mut dyn ViewRenderer,
        event_id: &EventId,
    ) -> AnchorOutcome {
        let store = self.store();
        let outcome = self.navigator.anchor_to_event(&store, renderer, event_id);
        self.remember_page(outcome);
        outcome
    }

    pub fn export(&self, case_name: &str) -> TimelineExport {
        build_export(&self.store(), case_name, chrono::Utc::now())
    }

    fn remember_page(&self, outcome: AnchorOutcome) {
        let (AnchorOutcome::Navigated { page }, Some(resume), Some(job_id)) =
            (outcome, &self.core.resume, self.loaded_job())
        else {
            return;
        };
        resume.save(&ResumeState::new(job_id, page));
    }

    fn reset(&mut self) {
        self.poller.stop();
        self.core.store.clear();
        let mut state = self.core.state();
        *state = SessionState::default();
    }
}
