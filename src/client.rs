//! Backend client abstraction and the reqwest implementation.
//!
//! The [`Backend`] trait is the seam between the client pipeline and the
//! processing service. [`HttpBackend`] speaks the HTTP contract described in
//! [`crate::api`]; tests substitute scripted implementations.
//!
//! # Authentication
//!
//! When an API key is configured it is sent as `X-API-Key`. The sentinel
//! value `demo` (any case) means demo mode and no header is sent. A missing
//! key never blocks a request.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::api::{StatusResponse, SubmitRequest, SubmitResponse};
use crate::config::{BackendConfig, Config};
use crate::models::JobId;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";
/// Key value that means "unauthenticated demo mode".
pub const DEMO_KEY: &str = "demo";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Operations the client needs from the processing service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Queue a document for processing and return the new job's id.
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, BackendError>;

    /// Fetch the current state of a job, including its result once complete.
    async fn job_status(&self, job_id: &JobId) -> Result<StatusResponse, BackendError>;

    /// Liveness probe. Any error means "unreachable".
    async fn health(&self) -> Result<(), BackendError>;
}

/// Returns the key to send, or `None` for missing, blank, or demo keys.
pub fn effective_api_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && !k.eq_ignore_ascii_case(DEMO_KEY))
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    /// Deadline for submit and health. Status requests have none; a slow
    /// one only delays the poller's next tick.
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig, api_key: Option<String>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            timeout,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: effective_api_key(api_key.as_deref()).map(str::to_string),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.backend, config.api_key())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_demo(&self) -> bool {
        self.api_key.is_none()
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, BackendError> {
        let url = format!("{}/process-case-file/", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;
        let body: SubmitResponse = Self::decode(response).await?;
        Ok(JobId::new(body.job_id.into_string()))
    }

    async fn job_status(&self, job_id: &JobId) -> Result<StatusResponse, BackendError> {
        let url = format!("{}/results/{}", self.base_url, job_id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        Self::decode(response).await
    }

    async fn health(&self) -> Result<(), BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Probe `/health` and print whether the backend is reachable.
///
/// Unreachable is reported, not returned as an error; the exit status of the
/// CLI stays zero so scripts can parse the output.
pub async fn run_health(config: &Config) -> Result<()> {
    let backend = HttpBackend::from_config(config)?;
    let mode = if backend.is_demo() { "demo" } else { "api-key" };

    match backend.health().await {
        Ok(()) => {
            println!("{:<10} {:<12} {}", "BACKEND", "STATUS", "AUTH");
            println!("{:<10} {:<12} {}", backend.base_url(), "reachable", mode);
        }
        Err(e) => {
            tracing::warn!(error = %e, base_url = backend.base_url(), "health probe failed");
            println!("{:<10} {:<12} {}", "BACKEND", "STATUS", "AUTH");
            println!("{:<10} {:<12} {}", backend.base_url(), "unreachable", mode);
            eprintln!(
                "Backend unreachable ({}). Check backend.base_url or set {}.",
                e,
                crate::config::API_KEY_ENV
            );
        }
    }
    Ok(())
}
