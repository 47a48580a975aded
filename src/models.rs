//! Core data models used throughout CaseFolio.
//!
//! These types represent the facts, events, and contradictions that the
//! backend produces for a processed document, plus the lifecycle of the job
//! that produced them. They are validated, normalized forms; the raw wire
//! shapes live in [`crate::api`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Identifier of an extracted [`Fact`].
    FactId
);
id_type!(
    /// Identifier of a synthesized [`Event`].
    EventId
);
id_type!(ContradictionId);
id_type!(
    /// Identifier the backend assigns to a processing job.
    JobId
);

/// Region of a page, in the backend's page coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A deterministic, source-anchored datum extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    pub id: FactId,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    /// 1-based page number. Always present once stored.
    pub page: u32,
    pub bounding_box: Option<BoundingBox>,
    /// In `[0, 1]`.
    pub confidence: Option<f64>,
    pub context: Option<String>,
}

/// A higher-level occurrence synthesized from one or more facts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: EventId,
    pub description: String,
    pub date: NaiveDateTime,
    pub category: Option<String>,
    pub confidence_score: Option<f64>,
    /// Ordered; entries may not resolve in the store.
    pub source_fact_ids: Vec<FactId>,
    /// Page hint carried by the backend, used when no source fact resolves.
    pub page_hint: Option<u32>,
}

/// How serious a contradiction is. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

/// A flagged inconsistency between two events.
///
/// Either event may be absent from the store; consumers must tolerate
/// dangling references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contradiction {
    pub id: ContradictionId,
    pub event1_id: EventId,
    pub event2_id: EventId,
    pub severity: Severity,
    pub explanation: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub confidence: Option<f64>,
}

impl Contradiction {
    pub fn involves(&self, event_id: &EventId) -> bool {
        &self.event1_id == event_id || &self.event2_id == event_id
    }
}

/// Lifecycle state of a job.
///
/// `Queued → Running* → (Completed | Failed)`. Terminal states never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    /// In progress; carries the backend's stage tag (e.g. `EXTRACTING`).
    Running { stage: String },
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn label(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running { stage } => stage,
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    pub message: Option<String>,
}

/// One observation of a job's state, as returned by a status request.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Option<Progress>,
    pub error: Option<String>,
}
