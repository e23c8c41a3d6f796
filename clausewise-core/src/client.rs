//! Client for the contract-analysis backend.
//!
//! The [`AnalysisBackend`] trait is the seam the dashboard depends on.
//! [`HttpAnalysisClient`] talks to the real service over a multipart POST;
//! [`MockAnalysisBackend`] replays queued outcomes for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::AnalysisError;
use crate::types::{AnalysisRequest, AnalysisResult, ContractFile, Credentials};

/// Fallback message when a failing response has an empty body.
const GENERIC_FAILURE: &str = "Analysis failed";

/// Trait for analysis backends.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Submit one contract for analysis.
    ///
    /// Fails fast with [`AnalysisError::Configuration`], without any network
    /// traffic, when `credentials` is absent or the request is invalid.
    async fn analyze(
        &self,
        file: &ContractFile,
        request: &AnalysisRequest,
        credentials: Option<&Credentials>,
    ) -> Result<AnalysisResult, AnalysisError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Wire shape of a successful `/api/analyze` response.
///
/// Every field is required; a body missing any of them is a parse error.
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    analysis: String,
    key_points: String,
    recommendations: String,
    risk_score: f64,
}

impl From<AnalyzeResponse> for AnalysisResult {
    fn from(wire: AnalyzeResponse) -> Self {
        AnalysisResult {
            analysis: wire.analysis,
            key_points: wire.key_points,
            recommendations: wire.recommendations,
            risk_score: wire.risk_score,
        }
    }
}

/// Reply from the backend's health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

/// HTTP client for the analysis backend.
pub struct HttpAnalysisClient {
    client: Client,
    analyze_url: String,
    health_url: String,
}

impl HttpAnalysisClient {
    /// Create a client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, AnalysisError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            AnalysisError::configuration(format!("Failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            analyze_url: config.analyze_url(),
            health_url: config.health_url(),
        })
    }

    fn build_form(
        file: &ContractFile,
        request: &AnalysisRequest,
        credentials: &Credentials,
    ) -> Result<reqwest::multipart::Form, AnalysisError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| AnalysisError::configuration(format!("MIME error: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("openai_api_key", credentials.api_key().to_string())
            .text("analysis_type", request.kind().label());

        if let Some(query) = request.custom_query() {
            form = form.text("custom_query", query.to_string());
        }
        Ok(form)
    }

    /// Probe the backend's health endpoint. Needs no credentials.
    pub async fn health(&self) -> Result<HealthStatus, AnalysisError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(application_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| AnalysisError::Parse {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn analyze(
        &self,
        file: &ContractFile,
        request: &AnalysisRequest,
        credentials: Option<&Credentials>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let credentials = credentials
            .ok_or_else(|| AnalysisError::configuration("API configuration not set"))?;
        request.validate()?;

        let form = Self::build_form(file, request, credentials)?;

        debug!(
            file = %file.file_name,
            file_size = file.size(),
            analysis_type = request.kind().label(),
            has_custom_query = request.custom_query().is_some(),
            url = %self.analyze_url,
            "Sending analysis request"
        );

        let response = self
            .client
            .post(&self.analyze_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), body_len = body.len(), "Received analysis response");

        if !status.is_success() {
            let err = application_error(status, &body);
            warn!(status = status.as_u16(), error = %err, "Analysis request rejected");
            return Err(err);
        }

        decode_result(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn transport_error(e: reqwest::Error) -> AnalysisError {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    AnalysisError::Transport { message }
}

/// Map a non-success response onto an application error.
///
/// Prefers a non-blank JSON `detail` field. Any other JSON body, or an empty
/// body, gives the generic message; a body that is not JSON is shown as-is.
pub(crate) fn application_error(status: StatusCode, body: &str) -> AnalysisError {
    let message = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(fields)) => match fields.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.trim().is_empty() => {
                detail.clone()
            }
            Some(serde_json::Value::String(_) | serde_json::Value::Null) | None => {
                GENERIC_FAILURE.to_string()
            }
            Some(other) => other.to_string(),
        },
        Ok(_) => GENERIC_FAILURE.to_string(),
        Err(_) if body.trim().is_empty() => GENERIC_FAILURE.to_string(),
        Err(_) => body.to_string(),
    };
    AnalysisError::Application {
        status: status.as_u16(),
        message,
    }
}

/// Decode a success body into the view model.
pub(crate) fn decode_result(body: &str) -> Result<AnalysisResult, AnalysisError> {
    serde_json::from_str::<AnalyzeResponse>(body)
        .map(AnalysisResult::from)
        .map_err(|e| AnalysisError::Parse {
            message: e.to_string(),
        })
}

/// A mock analysis backend for testing.
///
/// Pops one queued outcome per call that gets past the pre-flight checks;
/// [`MockAnalysisBackend::call_count`] counts only those calls, so it
/// equals the number of requests a real backend would have received.
pub struct MockAnalysisBackend {
    outcomes: Mutex<Vec<Result<AnalysisResult, AnalysisError>>>,
    call_count: AtomicUsize,
}

impl MockAnalysisBackend {
    /// Create a new mock that fails every call (no outcomes queued).
    pub fn new() -> Self {
        Self::with_outcomes(Vec::new())
    }

    /// Create a mock with pre-configured outcomes, returned in order.
    pub fn with_outcomes(outcomes: Vec<Result<AnalysisResult, AnalysisError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Queue one more outcome.
    pub fn push(&self, outcome: Result<AnalysisResult, AnalysisError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(outcome);
    }

    /// Number of calls that would have reached the network.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockAnalysisBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisBackend for MockAnalysisBackend {
    async fn analyze(
        &self,
        _file: &ContractFile,
        request: &AnalysisRequest,
        credentials: Option<&Credentials>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if credentials.is_none() {
            return Err(AnalysisError::configuration("API configuration not set"));
        }
        request.validate()?;

        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if outcomes.is_empty() {
            Err(AnalysisError::Transport {
                message: "no mock outcomes queued".into(),
            })
        } else {
            outcomes.remove(0)
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
