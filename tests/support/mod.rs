//! In-process fake of the processing service, served with axum on an
//! ephemeral port.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    /// Status replies per job. The last reply repeats.
    replies: HashMap<String, VecDeque<Value>>,
    next_job_ids: VecDeque<String>,
    submissions: Vec<Value>,
    api_keys: Vec<Option<String>>,
    status_calls: usize,
    status_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
    pub fn script(&self, job_id: &str, replies: Vec<Value>) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .insert(job_id.to_string(), replies.into());
    }

    pub fn queue_job_id(&self, job_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .next_job_ids
            .push_back(job_id.to_string());
    }

    /// Hold every status reply for `delay` before answering.
    pub fn delay_status(&self, delay: Duration) {
        self.inner.lock().unwrap().status_delay = Some(delay);
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.inner.lock().unwrap().submissions.clone()
    }

    pub fn api_keys(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().api_keys.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.inner.lock().unwrap().status_calls
    }

    fn record_key(&self, headers: &HeaderMap) {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.inner.lock().unwrap().api_keys.push(key);
    }

    /// Serve on 127.0.0.1 and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/health", get(health))
            .route("/process-case-file/", post(submit))
            .route("/results/{job_id}", get(results))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

async fn health(State(fake): State<FakeBackend>, headers: HeaderMap) -> Json<Value> {
    fake.record_key(&headers);
    Json(json!({"status": "ok"}))
}

async fn submit(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    fake.record_key(&headers);
    let mut inner = fake.inner.lock().unwrap();
    let job_id = inner
        .next_job_ids
        .pop_front()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let case_id = body.get("case_id").cloned().unwrap_or(Value::Null);
    inner.submissions.push(body);
    Ok(Json(json!({"job_id": job_id, "case_id": case_id, "status": "queued"})))
}

async fn results(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    fake.record_key(&headers);
    let delay = fake.inner.lock().unwrap().status_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut inner = fake.inner.lock().unwrap();
    inner.status_calls += 1;
    let replies = inner.replies.get_mut(&job_id).ok_or(StatusCode::NOT_FOUND)?;
    let reply = if replies.len() > 1 {
        replies.pop_front()
    } else {
        replies.front().cloned()
    };
    reply.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// A finished job for the "pain reported, then denied" note.
pub fn pain_result(job_id: &str) -> Value {
    json!({
        "job_id": job_id,
        "state": "SUCCESS",
        "progress": {"current": 4, "total": 4, "status": "Processing complete"},
        "result": {
            "document_name": "notes.txt",
            "total_pages": 2,
            "facts": [
                {"id": 1, "type": "date", "value": "01/10/2024", "page": 1,
                 "bounding_box": [10.0, 20.0, 110.0, 40.0], "confidence": 0.95,
                 "context": "On 01/10/2024, patient reported severe pain."},
                {"id": 2, "type": "date", "value": "02/15/2024", "page": 2,
                 "confidence": 0.9, "context": "On 02/15/2024, patient denied any pain."}
            ],
            "events": [
                {"id": 11, "event_date": "2024-02-15T00:00:00",
                 "event_description": "Patient denied any pain", "category": "medical",
                 "confidence_score": 0.9, "source_facts": [{"id": 2, "type": "date", "value": "02/15/2024"}]},
                {"id": 10, "event_date": "2024-01-10T00:00:00",
                 "event_description": "Patient reported severe pain", "category": "medical",
                 "confidence_score": 0.95, "source_facts": [{"id": 1, "type": "date", "value": "01/10/2024"}]}
            ],
            "contradictions": [
                {"id": 1, "event1_id": 10, "event2_id": 11, "type": "statement",
                 "severity": "high", "explanation": "Pain reported then denied", "confidence": 0.9}
            ]
        }
    })
}
