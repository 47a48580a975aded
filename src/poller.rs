//! Polls one job at a time until it reaches a terminal state.
//!
//! [`JobPoller::start_polling`] spawns a loop on the tokio runtime that
//! issues a status request every interval. The loop ends when the job
//! completes or fails, when the backend stays unreachable for too many
//! consecutive requests, or when the attempt cap is reached.
//!
//! # Stale responses
//!
//! Each polling session gets a generation number. Results are handed to the
//! [`PollObserver`] only while holding the poller's lock and only if the
//! session's generation is still the active one. `start_polling` and `stop`
//! bump the generation first, so anything a superseded session produces is
//! dropped before it can reach the store.
//!
//! # Retry model
//!
//! | Response | Effect |
//! |----------|--------|
//! | transport error / non-2xx | failure counter += 1, fatal at threshold |
//! | queued / running stage | counter reset, progress reported |
//! | completed | result handed to observer, loop ends |
//! | failed | backend message reported, loop ends |
//! | attempt cap reached | [`PollError::Timeout`] |

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ResultPayload;
use crate::client::Backend;
use crate::config::PollingConfig;
use crate::models::{JobId, JobSnapshot, JobStatus};

/// Why a polling session ended without a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PollError {
    #[error("lost contact with the backend after {failures} consecutive failures: {last_error}")]
    Transport { failures: u32, last_error: String },

    #[error("job did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("job failed: {message}")]
    JobFailed { message: String },

    #[error("job completed without a result payload")]
    MissingResult,
}

impl PollError {
    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Transport { .. } => "transport",
            PollError::Timeout { .. } => "timeout",
            PollError::JobFailed { .. } => "job_failed",
            PollError::MissingResult => "missing_result",
        }
    }
}

/// Receives the effects of the active polling session.
///
/// Callbacks run while the poller's lock is held and must not call back
/// into the poller.
pub trait PollObserver: Send + Sync {
    fn on_progress(&self, snapshot: &JobSnapshot);
    fn on_completed(&self, job_id: &JobId, payload: ResultPayload);
    fn on_failed(&self, job_id: &JobId, error: PollError);
}

/// Shortest interval the loop will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_consecutive_failures: u32,
}

impl From<&PollingConfig> for PollerSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval().max(MIN_INTERVAL),
            max_attempts: config.max_attempts.max(1),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

#[derive(Debug, Default)]
struct ActivePoll {
    generation: u64,
    job_id: Option<JobId>,
}

pub struct JobPoller {
    backend: Arc<dyn Backend>,
    observer: Arc<dyn PollObserver>,
    settings: PollerSettings,
    active: Arc<Mutex<ActivePoll>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JobPoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        observer: Arc<dyn PollObserver>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            backend,
            observer,
            settings,
            active: Arc::new(Mutex::new(ActivePoll::default())),
            task: Mutex::new(None),
        }
    }

    /// Start polling `job_id`, stopping any previous session first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, job_id: JobId) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(old) = active.job_id.take() {
                tracing::info!(job_id = %old, "superseded by new job, stopping poll");
            }
            active.generation += 1;
            active.job_id = Some(job_id.clone());
            active.generation
        };

        tracing::info!(job_id = %job_id, generation, "polling started");

        let session = PollSession {
            job_id,
            generation,
            backend: Arc::clone(&self.backend),
            observer: Arc::clone(&self.observer),
            settings: self.settings.clone(),
            active: Arc::clone(&self.active),
        };
        *task = Some(tokio::spawn(session.run()));
    }

    /// Stop the active session, if any. Safe to call repeatedly.
    ///
    /// A request already in flight may still finish but its result is
    /// discarded.
    pub fn stop(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.generation += 1;
        if let Some(job_id) = active.job_id.take() {
            tracing::info!(job_id = %job_id, "polling stopped");
        }
    }

    /// The job currently being polled.
    pub fn active_job(&self) -> Option<JobId> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .job_id
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.active_job().is_some()
    }

    /// Wait for the current session's loop to exit (naturally or by `stop`).
    pub async fn join(&self) {
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            // A cancelled loop is a normal way to end.
            let _ = handle.await;
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

struct PollSession {
    job_id: JobId,
    generation: u64,
    backend: Arc<dyn Backend>,
    observer: Arc<dyn PollObserver>,
    settings: PollerSettings,
    active: Arc<Mutex<ActivePoll>>,
}

enum Tick {
    Continue,
    Done,
}

impl PollSession {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.settings.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        for attempt in 1..=self.settings.max_attempts {
            ticker.tick().await;

            match self.backend.job_status(&self.job_id).await {
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempt,
                        failures,
                        error = %e,
                        "status request failed"
                    );
                    if failures >= self.settings.max_consecutive_failures {
                        self.fail(PollError::Transport {
                            failures,
                            last_error: e.to_string(),
                        });
                        return;
                    }
                }
                Ok(response) => {
                    failures = 0;
                    let snapshot = response.snapshot(&self.job_id);
                    if let Tick::Done = self.handle(snapshot, response.result) {
                        return;
                    }
                }
            }
        }

        self.fail(PollError::Timeout {
            attempts: self.settings.max_attempts,
        });
    }

    fn handle(&self, snapshot: JobSnapshot, result: Option<ResultPayload>) -> Tick {
        match snapshot.status {
            JobStatus::Completed => {
                match result {
                    Some(payload) => {
                        tracing::info!(job_id = %self.job_id, "job completed");
                        self.deliver(true, |observer| {
                            observer.on_completed(&self.job_id, payload)
                        });
                    }
                    None => self.fail(PollError::MissingResult),
                }
                Tick::Done
            }
            JobStatus::Failed => {
                let message = snapshot
                    .error
                    .unwrap_or_else(|| "unknown processing error".to_string());
                self.fail(PollError::JobFailed { message });
                Tick::Done
            }
            JobStatus::Queued | JobStatus::Running { .. } => {
                tracing::debug!(job_id = %self.job_id, status = %snapshot.status, "job in progress");
                self.deliver(false, |observer| observer.on_progress(&snapshot));
                Tick::Continue
            }
        }
    }

    fn fail(&self, error: PollError) {
        tracing::warn!(job_id = %self.job_id, kind = error.kind(), error = %error, "polling ended");
        self.deliver(true, |observer| observer.on_failed(&self.job_id, error));
    }

    /// Run `effect` against the observer if this session is still current.
    fn deliver(&self, terminal: bool, effect: impl FnOnce(&dyn PollObserver)) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.generation != self.generation {
            tracing::debug!(
                job_id = %self.job_id,
                generation = self.generation,
                "discarding response from superseded poll"
            );
            return;
        }
        effect(self.observer.as_ref());
        if terminal {
            active.job_id = None;
        }
    }
}
