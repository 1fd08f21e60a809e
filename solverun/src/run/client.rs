//! Job-control client for the remote solver.
//!
//! The [`RunStatusClient`] trait abstracts the three request/response calls
//! (`POST /runs`, `GET /runs/{id}`, `POST /runs/{id}/cancel`) so the poll
//! loop and orchestrator can be driven by scripted clients in tests.
//! [`HttpRunClient`] is the production implementation over `reqwest`.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use super::error::TransportError;
use super::types::{JobSpec, RunStatus};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("solverun/", env!("CARGO_PKG_VERSION"));

/// Stateless job-control calls against the solver backend.
///
/// Implementations must be safe to call concurrently with themselves.
pub trait RunStatusClient: Send + Sync {
    /// Launches a run. The returned status is `pending` or `running`.
    fn create_run(
        &self,
        job: &JobSpec,
    ) -> impl Future<Output = Result<RunStatus, TransportError>> + Send;

    /// Fetches the current status of a run.
    ///
    /// Network failures are expected to be retried by the caller.
    fn get_run_status(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<RunStatus, TransportError>> + Send;

    /// Requests cancellation. Rejection (e.g. the run is already terminal)
    /// is reported as an error but is not fatal to the caller.
    fn cancel_run(&self, run_id: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Connection settings for the solver backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Optional bearer token.
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP implementation of [`RunStatusClient`].
#[derive(Clone)]
pub struct HttpRunClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpRunClient {
    /// Creates a client with a pooled `reqwest::Client`.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn runs_url(&self) -> String {
        format!("{}/runs", self.base_url)
    }

    pub(crate) fn run_url(&self, run_id: &str) -> String {
        format!("{}/runs/{}", self.base_url, run_id)
    }

    pub(crate) fn cancel_url(&self, run_id: &str) -> String {
        format!("{}/runs/{}/cancel", self.base_url, run_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let response = match self.authorize(request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(TransportError::Network(e.to_string()));
            }
        };

        let status = response.status();
        debug!(url = url, status = status.as_u16(), "HTTP response received");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, TransportError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {}", e)))?;
        trace!(url = url, bytes = bytes.len(), "HTTP response body read");
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl RunStatusClient for HttpRunClient {
    async fn create_run(&self, job: &JobSpec) -> Result<RunStatus, TransportError> {
        let url = self.runs_url();
        let response = self
            .send(self.http.post(&url).json(&job.to_body()), &url)
            .await?;
        Self::decode(response, &url).await
    }

    async fn get_run_status(&self, run_id: &str) -> Result<RunStatus, TransportError> {
        let url = self.run_url(run_id);
        let response = self.send(self.http.get(&url), &url).await?;
        Self::decode(response, &url).await
    }

    async fn cancel_run(&self, run_id: &str) -> Result<(), TransportError> {
        let url = self.cancel_url(run_id);
        self.send(self.http.post(&url), &url).await.map(|_| ())
    }
}
