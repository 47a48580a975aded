//! Scripted backend and recording observer shared by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{ResultPayload, StatusResponse, SubmitRequest};
use crate::client::{Backend, BackendError};
use crate::models::{JobId, JobSnapshot};
use crate::poller::{PollError, PollObserver};

/// One scripted reply to a status request.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Value),
    Fail(u16),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    last: Option<Step>,
    calls: usize,
    delay: Option<Duration>,
}

/// Replays scripted status responses per job. The last step repeats forever.
#[derive(Default)]
pub struct ScriptedBackend {
    jobs: Mutex<HashMap<String, Script>>,
    next_ids: Mutex<VecDeque<String>>,
    submitted: Mutex<Vec<SubmitRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, job_id: &str, steps: Vec<Step>) {
        let mut jobs = self.jobs.lock().unwrap();
        let script = jobs.entry(job_id.to_string()).or_default();
        script.steps = steps.into();
    }

    pub fn set_delay(&self, job_id: &str, delay: Duration) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.entry(job_id.to_string()).or_default().delay = Some(delay);
    }

    /// Job ids handed out by successive `submit` calls.
    pub fn queue_job_ids(&self, ids: &[&str]) {
        self.next_ids
            .lock()
            .unwrap()
            .extend(ids.iter().map(|s| s.to_string()));
    }

    pub fn calls(&self, job_id: &str) -> usize {
        self.jobs
            .lock()
            .unwrap()
            .get(job_id)
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }

    fn next_step(&self, job_id: &str) -> (Option<Step>, Option<Duration>) {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(script) = jobs.get_mut(job_id) else {
            return (None, None);
        };
        script.calls += 1;
        if let Some(step) = script.steps.pop_front() {
            script.last = Some(step);
        }
        (script.last.clone(), script.delay)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, BackendError> {
        self.submitted.lock().unwrap().push(request.clone());
        let id = self.next_ids.lock().unwrap().pop_front();
        id.map(JobId::new).ok_or(BackendError::Status {
            status: 500,
            body: "no scripted job id".to_string(),
        })
    }

    async fn job_status(&self, job_id: &JobId) -> Result<StatusResponse, BackendError> {
        let (step, delay) = self.next_step(job_id.as_str());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            Some(Step::Reply(body)) => {
                serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))
            }
            Some(Step::Fail(status)) => Err(BackendError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Err(BackendError::Status {
                status: 404,
                body: format!("unknown job {}", job_id),
            }),
        }
    }

    async fn health(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Progress(JobSnapshot),
    Completed(JobId, ResultPayload),
    Failed(JobId, PollError),
}

impl Observed {
    pub fn job_id(&self) -> &JobId {
        match self {
            Observed::Progress(s) => &s.id,
            Observed::Completed(id, _) | Observed::Failed(id, _) => id,
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn take(&self) -> Vec<Observed> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }
}

impl PollObserver for RecordingObserver {
    fn on_progress(&self, snapshot: &JobSnapshot) {
        self.seen
            .lock()
            .unwrap()
            .push(Observed::Progress(snapshot.clone()));
    }

    fn on_completed(&self, job_id: &JobId, payload: ResultPayload) {
        self.seen
            .lock()
            .unwrap()
            .push(Observed::Completed(job_id.clone(), payload));
    }

    fn on_failed(&self, job_id: &JobId, error: PollError) {
        self.seen
            .lock()
            .unwrap()
            .push(Observed::Failed(job_id.clone(), error));
    }
}
