use std::time::Duration;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use crate::config::ClientConfig;
use crate::errors::{with_retry, ImpactError, RetryConfig};
use super::http::{build_client, read_json};
use super::types::{HealthResponse, PipelineRequest, PipelineResponse, SampleRequirement};

/// Request/response client for the SDLC intelligence backend.
#[derive(Debug, Clone)]
pub struct SdlcClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl SdlcClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ImpactError> {
        Ok(Self {
            http: build_client(config.connect_timeout())?,
            base_url: config.sdlc_api_url.clone(),
            timeout: config.request_timeout(),
            retry: config.retry(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ImpactError> {
        let resp = self.http.get(url).timeout(self.timeout).send().await?;
        read_json(resp).await
    }

    async fn get_with_retry<T: DeserializeOwned>(&self, name: &str, endpoint: &str) -> Result<T, ImpactError> {
        let url = self.url(endpoint);
        with_retry(name, &self.retry, || self.get_json(&url)).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ImpactError> {
        debug!(base_url = %self.base_url, "Checking SDLC backend health");
        self.get_with_retry("health", "/api/v1/health").await
    }

    /// Run every stage and wait for the full response.
    pub async fn run_pipeline(&self, request: &PipelineRequest) -> Result<PipelineResponse, ImpactError> {
        info!(session_id = %request.session_id, "Running pipeline (blocking)");
        let resp = self.http
            .post(self.url("/api/v1/impact/run-pipeline"))
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn pipeline_summary(&self, session_id: &str) -> Result<PipelineResponse, ImpactError> {
        debug!(session_id = %session_id, "Fetching session summary");
        self.get_with_retry("pipeline_summary", &format!("/api/v1/impact/{}/summary", session_id)).await
    }

    pub async fn sample_requirement(&self) -> Result<SampleRequirement, ImpactError> {
        let resp = self.http
            .get(self.url("/api/v1/samples/requirement"))
            .timeout(self.timeout)
            .send()
            .await?;
        read_json(resp).await
    }
}

/// `session-<base36 millis>-<6 random chars>`.
pub fn generate_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("session-{}-{}", to_base36(millis), &random[..6])
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
