//! Wire schemas for the processing backend's HTTP contract.
//!
//! | Method | Path | Body / Response |
//! |--------|------|-----------------|
//! | `POST` | `/process-case-file/` | [`SubmitRequest`] → [`SubmitResponse`] |
//! | `GET`  | `/results/{job_id}` | → [`StatusResponse`] |
//! | `GET`  | `/health` | any 2xx |
//!
//! Records inside a result payload are kept as raw JSON values until
//! reconciliation, so one malformed record cannot fail the whole response.
//! The typed per-record shapes ([`RawFact`], [`RawEvent`],
//! [`RawContradiction`]) accept the field aliases the backend has used.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{JobId, JobSnapshot, JobStatus, Progress};

/// Body of `POST /process-case-file/`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub case_id: String,
    pub document_name: String,
    pub document_content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: WireId,
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Identifiers arrive as strings or integers depending on the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Int(i64),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Int(n) => n.to_string(),
        }
    }
}

/// Response of `GET /results/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub job_id: Option<WireId>,
    #[serde(alias = "status")]
    pub state: String,
    #[serde(default)]
    pub progress: Option<Value>,
    #[serde(default, deserialize_with = "lenient_result")]
    pub result: Option<ResultPayload>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl StatusResponse {
    /// Normalize into a [`JobSnapshot`] for `job_id`.
    pub fn snapshot(&self, job_id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: job_id.clone(),
            status: parse_state(&self.state),
            progress: self.progress.as_ref().and_then(parse_progress),
            error: self.error.as_ref().and_then(error_message),
        }
    }
}

/// Map the backend's state string onto [`JobStatus`].
///
/// `PENDING`/`queued` → queued, `SUCCESS`/`completed` → completed,
/// `FAILURE`/`failed` → failed, anything else is a running stage.
pub fn parse_state(state: &str) -> JobStatus {
    match state.trim().to_ascii_uppercase().as_str() {
        "PENDING" | "QUEUED" => JobStatus::Queued,
        "SUCCESS" | "COMPLETED" => JobStatus::Completed,
        "FAILURE" | "FAILED" => JobStatus::Failed,
        _ => JobStatus::Running {
            stage: state.trim().to_string(),
        },
    }
}

fn parse_progress(value: &Value) -> Option<Progress> {
    let current = value.get("current").and_then(Value::as_u64)?;
    let total = value.get("total").and_then(Value::as_u64)?;
    Some(Progress {
        current: u32::try_from(current).unwrap_or(u32::MAX),
        total: u32::try_from(total).unwrap_or(u32::MAX),
        message: value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// The backend reports errors either as a bare string or as
/// `{ "type": ..., "message": ... }`.
fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("exc_message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

/// The `result` object of a completed job.
///
/// Every field is kept as raw JSON so a wrongly typed field (`null`, a
/// string page count, a non-list collection) never fails the enclosing
/// status response. [`crate::reconcile`] interprets the values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub document_name: Value,
    #[serde(default)]
    pub total_pages: Value,
    #[serde(default)]
    pub facts: Value,
    #[serde(default)]
    pub events: Value,
    #[serde(default)]
    pub contradictions: Value,
}

/// A `result` that is not an object decodes as absent.
fn lenient_result<'de, D>(deserializer: D) -> Result<Option<ResultPayload>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFact {
    pub id: WireId,
    #[serde(default, rename = "type", alias = "fact_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, alias = "page_number")]
    pub page: Value,
    #[serde(default)]
    pub bounding_box: Value,
    #[serde(default, alias = "confidence_score")]
    pub confidence: Value,
    #[serde(default, alias = "text_context")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: WireId,
    #[serde(alias = "event_description")]
    pub description: String,
    #[serde(alias = "event_date")]
    pub date: String,
    #[serde(default, alias = "event_category")]
    pub category: Option<String>,
    #[serde(default, alias = "confidence")]
    pub confidence_score: Value,
    #[serde(default)]
    pub source_facts: Vec<RawFactRef>,
    #[serde(default)]
    pub source_fact_ids: Vec<WireId>,
    #[serde(default, alias = "page_number")]
    pub page: Value,
}

impl RawEvent {
    /// Source fact ids in backend order, from whichever field was populated.
    pub fn fact_ids(&self) -> Vec<String> {
        if !self.source_fact_ids.is_empty() {
            return self
                .source_fact_ids
                .iter()
                .cloned()
                .map(WireId::into_string)
                .collect();
        }
        self.source_facts
            .iter()
            .map(|f| f.id.clone().into_string())
            .collect()
    }
}

/// Summary of a fact embedded in an event (`{id, type, value}`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawFactRef {
    pub id: WireId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContradiction {
    pub id: WireId,
    pub event1_id: WireId,
    pub event2_id: WireId,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, rename = "type", alias = "contradiction_type")]
    pub kind: Option<String>,
    #[serde(default, alias = "confidence_score")]
    pub confidence: Value,
}
