//! Job progress reporting.
//!
//! Reports observable progress while a job is being polled so users see
//! which stage the backend is in and how far along it is. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use crate::models::{JobId, JobSnapshot, JobStatus};

/// A single progress event for a polled job.
#[derive(Clone, Debug)]
pub enum JobProgressEvent {
    /// The job was accepted by the backend.
    Submitted { job_id: JobId },
    /// A non-terminal status observation.
    Stage {
        job_id: JobId,
        stage: String,
        current: Option<u32>,
        total: Option<u32>,
        message: Option<String>,
    },
    /// Terminal state reached.
    Finished { job_id: JobId, ok: bool },
}

impl JobProgressEvent {
    pub fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        let progress = snapshot.progress.as_ref();
        JobProgressEvent::Stage {
            job_id: snapshot.id.clone(),
            stage: match &snapshot.status {
                JobStatus::Running { stage } => stage.clone(),
                other => other.label().to_string(),
            },
            current: progress.map(|p| p.current),
            total: progress.map(|p| p.total),
            message: progress.and_then(|p| p.message.clone()),
        }
    }
}

/// Reports job progress. Implementations write to stderr (human or JSON).
pub trait JobProgressReporter: Send + Sync {
    fn report(&self, event: JobProgressEvent);
}

/// Human-friendly progress on stderr: "job 3f2a…  EXTRACTING  2 / 4  Extracting facts...".
pub struct StderrProgress;

impl JobProgressReporter for StderrProgress {
    fn report(&self, event: JobProgressEvent) {
        let line = match &event {
            JobProgressEvent::Submitted { job_id } => format!("job {}  submitted\n", job_id),
            JobProgressEvent::Stage {
                job_id,
                stage,
                current,
                total,
                message,
            } => {
                let counts = match (current, total) {
                    (Some(c), Some(t)) => format!("  {} / {}", c, t),
                    _ => String::new(),
                };
                let message = message
                    .as_deref()
                    .map(|m| format!("  {}", m))
                    .unwrap_or_default();
                format!("job {}  {}{}{}\n", job_id, stage, counts, message)
            }
            JobProgressEvent::Finished { job_id, ok } => {
                format!("job {}  {}\n", job_id, if *ok { "done" } else { "failed" })
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JobProgressReporter for JsonProgress {
    fn report(&self, event: JobProgressEvent) {
        let obj = match &event {
            JobProgressEvent::Submitted { job_id } => serde_json::json!({
                "event": "progress",
                "job_id": job_id,
                "phase": "submitted"
            }),
            JobProgressEvent::Stage {
                job_id,
                stage,
                current,
                total,
                message,
            } => serde_json::json!({
                "event": "progress",
                "job_id": job_id,
                "phase": "polling",
                "stage": stage,
                "current": current,
                "total": total,
                "message": message
            }),
            JobProgressEvent::Finished { job_id, ok } => serde_json::json!({
                "event": "progress",
                "job_id": job_id,
                "phase": "finished",
                "ok": ok
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl JobProgressReporter for NoProgress {
    fn report(&self, _event: JobProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn JobProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Progress;

    #[test]
    fn stage_event_from_running_snapshot() {
        let snapshot = JobSnapshot {
            id: "j1".into(),
            status: JobStatus::Running {
                stage: "EXTRACTING".into(),
            },
            progress: Some(Progress {
                current: 2,
                total: 4,
                message: Some("Extracting facts".into()),
            }),
            error: None,
        };
        match JobProgressEvent::from_snapshot(&snapshot) {
            JobProgressEvent::Stage {
                stage,
                current,
                total,
                message,
                ..
            } => {
                assert_eq!(stage, "EXTRACTING");
                assert_eq!((current, total), (Some(2), Some(4)));
                assert_eq!(message.as_deref(), Some("Extracting facts"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn queued_snapshot_uses_label() {
        let snapshot = JobSnapshot {
            id: "j1".into(),
            status: JobStatus::Queued,
            progress: None,
            error: None,
        };
        assert!(matches!(
            JobProgressEvent::from_snapshot(&snapshot),
            JobProgressEvent::Stage { stage, current: None, .. } if stage == "queued"
        ));
    }
}
