use std::collections::HashMap;
use std::time::Duration;
use bytes::Bytes;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use crate::api::http::{build_client, read_bytes, read_json};
use crate::config::ClientConfig;
use crate::errors::{with_retry, ImpactError, RetryConfig};
use super::types::{
    ApplyMappingResponse, DocHealthResponse, EntityType, ExportResponse, ExtractRequest, ExtractResponse,
    JobFilesResponse, JobListResponse, MappingSuggestionsResponse, PipelineJob, PreviewResponse, SyncResponse,
    TransformResponse, UploadResponse, ValidationResponse,
};
use super::upload::UploadBatch;

pub const DEFAULT_PREVIEW_LIMIT: u32 = 10;
pub const DEFAULT_JOB_PAGE_SIZE: u32 = 50;

/// Request/response client for the document pipeline backend. Every call is
/// one-shot; progress is observed by polling [`DocPipelineClient::job`].
#[derive(Debug, Clone)]
pub struct DocPipelineClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl DocPipelineClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ImpactError> {
        Ok(Self {
            http: build_client(config.connect_timeout())?,
            base_url: config.pipeline_api_url.clone(),
            timeout: config.request_timeout(),
            retry: config.retry(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/pipeline{}", self.base_url, endpoint)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ImpactError> {
        let resp = request.timeout(self.timeout).send().await?;
        read_json(resp).await
    }

    async fn get_with_retry<T: DeserializeOwned>(&self, name: &str, endpoint: &str) -> Result<T, ImpactError> {
        let url = self.url(endpoint);
        with_retry(name, &self.retry, || self.send(self.http.get(&url))).await
    }

    pub async fn health(&self) -> Result<DocHealthResponse, ImpactError> {
        debug!(base_url = %self.base_url, "Checking document pipeline health");
        self.get_with_retry("pipeline_health", "/health").await
    }

    pub async fn upload(&self, batch: UploadBatch) -> Result<UploadResponse, ImpactError> {
        info!(files = batch.files().len(), bytes = batch.total_bytes(), "Uploading documents");
        let form: Form = batch.into_form().await?;
        self.send(self.http.post(self.url("/upload")).multipart(form)).await
    }

    pub async fn job(&self, job_id: &str) -> Result<PipelineJob, ImpactError> {
        debug!(job_id = %job_id, "Fetching job status");
        self.get_with_retry("job_status", &format!("/jobs/{}", job_id)).await
    }

    pub async fn job_files(&self, job_id: &str) -> Result<JobFilesResponse, ImpactError> {
        self.get_with_retry("job_files", &format!("/jobs/{}/files", job_id)).await
    }

    pub async fn list_jobs(&self, limit: u32, offset: u32) -> Result<JobListResponse, ImpactError> {
        let url = self.url("/jobs");
        let query = [("limit", limit), ("offset", offset)];
        with_retry("list_jobs", &self.retry, || self.send(self.http.get(&url).query(&query))).await
    }

    pub async fn extract(&self, job_id: &str, options: &ExtractRequest) -> Result<ExtractResponse, ImpactError> {
        info!(job_id = %job_id, llm = ?options.use_llm_enhancement, "Running extraction");
        self.send(self.http.post(self.url(&format!("/extract/{}", job_id))).json(options)).await
    }

    pub async fn mapping_suggestions(
        &self,
        job_id: &str,
        entity: EntityType,
    ) -> Result<MappingSuggestionsResponse, ImpactError> {
        debug!(job_id = %job_id, entity = %entity, "Fetching mapping suggestions");
        let request = self
            .http
            .get(self.url(&format!("/mapping-suggestions/{}", job_id)))
            .query(&[("entity", entity.as_str())]);
        self.send(request).await
    }

    /// The body is the bare source-to-target field map.
    pub async fn apply_mapping(
        &self,
        job_id: &str,
        entity: EntityType,
        mappings: &HashMap<String, String>,
    ) -> Result<ApplyMappingResponse, ImpactError> {
        info!(job_id = %job_id, entity = %entity, fields = mappings.len(), "Applying mapping");
        let request = self
            .http
            .post(self.url(&format!("/apply-mapping/{}", job_id)))
            .query(&[("entity", entity.as_str())])
            .json(mappings);
        self.send(request).await
    }

    pub async fn transform(&self, job_id: &str) -> Result<TransformResponse, ImpactError> {
        info!(job_id = %job_id, "Running transformation");
        self.send(self.http.post(self.url(&format!("/transform/{}", job_id)))).await
    }

    pub async fn preview(
        &self,
        job_id: &str,
        entity: EntityType,
        limit: u32,
        offset: u32,
    ) -> Result<PreviewResponse, ImpactError> {
        let request = self
            .http
            .get(self.url(&format!("/preview/{}", job_id)))
            .query(&[("entity", entity.as_str())])
            .query(&[("limit", limit), ("offset", offset)]);
        self.send(request).await
    }

    pub async fn validation(&self, job_id: &str) -> Result<ValidationResponse, ImpactError> {
        info!(job_id = %job_id, "Running validation");
        self.send(self.http.get(self.url(&format!("/validation/{}", job_id)))).await
    }

    pub async fn export(&self, job_id: &str) -> Result<ExportResponse, ImpactError> {
        info!(job_id = %job_id, "Exporting CSV files");
        self.send(self.http.post(self.url(&format!("/export/{}", job_id)))).await
    }

    pub async fn download_csv(&self, job_id: &str, entity: EntityType) -> Result<Bytes, ImpactError> {
        debug!(job_id = %job_id, entity = %entity, "Downloading CSV");
        let resp = self
            .http
            .get(self.url(&format!("/export/{}/{}", job_id, entity)))
            .timeout(self.timeout)
            .send()
            .await?;
        read_bytes(resp).await.map_err(|e| match e {
            ImpactError::Api { status, .. } => ImpactError::Api {
                status,
                message: format!("Failed to download {} CSV", entity),
            },
            other => other,
        })
    }

    pub async fn sync_vector_db(&self, job_id: &str) -> Result<SyncResponse, ImpactError> {
        info!(job_id = %job_id, "Syncing to vector database");
        self.send(self.http.post(self.url(&format!("/sync-vector-db/{}", job_id)))).await
    }
}
