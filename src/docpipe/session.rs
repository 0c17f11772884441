use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::errors::ImpactError;
use super::client::DocPipelineClient;
use super::steps::{can_proceed_to_step, current_step_from_status, is_step_completed, step_status_for_job, StepStatus};
use super::types::{
    EntityType, ExportResponse, ExtractRequest, ExtractionResult, FileInfo, JobStatus, JobStep, MappingSuggestion,
    PipelineJob, SyncResponse, TransformResponse, ValidationResponse, ENTITY_TYPES,
};
use super::upload::UploadBatch;

/// Rows requested per entity when previewing transformed data.
pub const SESSION_PREVIEW_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSessionState {
    pub current_job: Option<PipelineJob>,
    pub job_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub uploaded_files: Vec<FileInfo>,
    pub extraction_results: HashMap<String, ExtractionResult>,
    pub mapping_suggestions: BTreeMap<EntityType, Vec<MappingSuggestion>>,
    pub applied_mappings: BTreeMap<EntityType, HashMap<String, String>>,
    pub transformed_data: BTreeMap<EntityType, Vec<Map<String, Value>>>,
    pub validation_results: Option<ValidationResponse>,
    pub export_results: Option<ExportResponse>,
    pub current_step: JobStep,
    pub is_processing: bool,
    pub processing_message: Option<String>,
}

impl Default for JobSessionState {
    fn default() -> Self {
        Self {
            current_job: None,
            job_id: None,
            is_loading: false,
            error: None,
            uploaded_files: Vec::new(),
            extraction_results: HashMap::new(),
            mapping_suggestions: ENTITY_TYPES.iter().map(|e| (*e, Vec::new())).collect(),
            applied_mappings: ENTITY_TYPES.iter().map(|e| (*e, HashMap::new())).collect(),
            transformed_data: ENTITY_TYPES.iter().map(|e| (*e, Vec::new())).collect(),
            validation_results: None,
            export_results: None,
            current_step: JobStep::Upload,
            is_processing: false,
            processing_message: None,
        }
    }
}

/// State container for one document job. Every action is a single request;
/// failures are recorded in `error` and returned, and never move the step.
pub struct JobSession {
    client: DocPipelineClient,
    state: JobSessionState,
}

impl JobSession {
    pub fn new(client: DocPipelineClient) -> Self {
        Self {
            client,
            state: JobSessionState::default(),
        }
    }

    pub fn state(&self) -> &JobSessionState {
        &self.state
    }

    fn require_job(&self) -> Result<String, ImpactError> {
        self.state.job_id.clone().ok_or(ImpactError::NoActiveJob)
    }

    fn begin(&mut self, message: impl Into<String>) {
        self.state.is_processing = true;
        self.state.processing_message = Some(message.into());
        self.state.error = None;
    }

    fn finish(&mut self) {
        self.state.is_processing = false;
        self.state.processing_message = None;
    }

    fn fail(&mut self, action: &str, error: ImpactError) -> ImpactError {
        warn!(job_id = ?self.state.job_id, action = action, error = %error, "Document pipeline action failed");
        self.state.error = Some(error.user_message());
        self.state.is_loading = false;
        self.finish();
        error
    }

    fn apply_job(&mut self, job: PipelineJob) {
        self.state.current_step = current_step_from_status(job.status);
        self.state.current_job = Some(job);
    }

    /// Upload a batch and load the job it creates.
    pub async fn create_job(&mut self, batch: UploadBatch) -> Result<String, ImpactError> {
        self.state.is_loading = true;
        self.begin("Uploading files...");

        let job = match self.upload_and_fetch(batch).await {
            Ok(job) => job,
            Err(e) => return Err(self.fail("upload", e)),
        };
        let job_id = job.job_id.clone();
        info!(job_id = %job_id, files = job.files_uploaded.len(), "Created document job");

        self.state.job_id = Some(job_id.clone());
        self.state.uploaded_files = job.files_uploaded.clone();
        self.state.current_job = Some(job);
        self.state.current_step = JobStep::Extract;
        self.state.is_loading = false;
        self.finish();
        Ok(job_id)
    }

    async fn upload_and_fetch(&self, batch: UploadBatch) -> Result<PipelineJob, ImpactError> {
        let uploaded = self.client.upload(batch).await?;
        self.client.job(&uploaded.job_id).await
    }

    pub async fn load_job(&mut self, job_id: &str) -> Result<(), ImpactError> {
        self.state.is_loading = true;
        self.state.error = None;

        let job = match self.client.job(job_id).await {
            Ok(job) => job,
            Err(e) => return Err(self.fail("load_job", e)),
        };

        self.state.job_id = Some(job_id.to_string());
        self.state.uploaded_files = job.files_uploaded.clone();
        self.state.extraction_results = job.extraction_results.clone().unwrap_or_default();
        let mapping_results = job.mapping_results.clone().unwrap_or_default();
        self.state.applied_mappings = ENTITY_TYPES
            .iter()
            .map(|e| (*e, mapping_results.get(e.as_str()).cloned().unwrap_or_default()))
            .collect();
        self.state.validation_results = job.validation_results.clone();
        self.state.is_loading = false;
        debug!(job_id = %job_id, status = %job.status, "Loaded document job");
        self.apply_job(job);
        Ok(())
    }

    /// Re-read the job record. Failures are logged and otherwise ignored.
    pub async fn refresh_job_status(&mut self) {
        let Some(job_id) = self.state.job_id.clone() else {
            return;
        };
        match self.client.job(&job_id).await {
            Ok(job) => self.apply_job(job),
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to refresh job status"),
        }
    }

    pub fn clear_job(&mut self) {
        self.state = JobSessionState::default();
    }

    pub async fn start_extraction(&mut self, options: &ExtractRequest) -> Result<(), ImpactError> {
        let job_id = self.require_job()?;
        self.begin("Extracting data from documents...");
        match self.client.extract(&job_id, options).await {
            Ok(response) => {
                self.state.extraction_results = response.extractions;
                self.state.current_step = JobStep::Map;
                self.finish();
                self.refresh_job_status().await;
                Ok(())
            }
            Err(e) => Err(self.fail("extract", e)),
        }
    }

    pub async fn fetch_mapping_suggestions(&mut self, entity: EntityType) -> Result<&[MappingSuggestion], ImpactError> {
        let job_id = self.require_job()?;
        self.begin(format!("Getting AI suggestions for {}...", entity));
        match self.client.mapping_suggestions(&job_id, entity).await {
            Ok(response) => {
                self.finish();
                let slot = self.state.mapping_suggestions.entry(entity).or_default();
                *slot = response.suggestions;
                Ok(slot.as_slice())
            }
            Err(e) => Err(self.fail("mapping_suggestions", e)),
        }
    }

    pub async fn apply_entity_mapping(
        &mut self,
        entity: EntityType,
        mappings: HashMap<String, String>,
    ) -> Result<(), ImpactError> {
        let job_id = self.require_job()?;
        self.begin(format!("Applying {} mappings...", entity));
        match self.client.apply_mapping(&job_id, entity, &mappings).await {
            Ok(_) => {
                self.state.applied_mappings.insert(entity, mappings);
                self.finish();
                self.refresh_job_status().await;
                Ok(())
            }
            Err(e) => Err(self.fail("apply_mapping", e)),
        }
    }

    pub async fn start_transformation(&mut self) -> Result<TransformResponse, ImpactError> {
        let job_id = self.require_job()?;
        self.begin("Transforming data...");
        match self.client.transform(&job_id).await {
            Ok(response) => {
                self.state.current_step = JobStep::Transform;
                self.finish();
                self.refresh_job_status().await;
                Ok(response)
            }
            Err(e) => Err(self.fail("transform", e)),
        }
    }

    /// First page of transformed rows. A failed fetch yields no rows.
    pub async fn fetch_preview(&mut self, entity: EntityType) -> Result<Vec<Map<String, Value>>, ImpactError> {
        let job_id = self.require_job()?;
        match self.client.preview(&job_id, entity, SESSION_PREVIEW_LIMIT, 0).await {
            Ok(response) => {
                self.state.transformed_data.insert(entity, response.data.clone());
                Ok(response.data)
            }
            Err(e) => {
                warn!(job_id = %job_id, entity = %entity, error = %e, "Failed to fetch preview");
                Ok(Vec::new())
            }
        }
    }

    pub async fn fetch_validation(&mut self) -> Result<&ValidationResponse, ImpactError> {
        let job_id = self.require_job()?;
        self.begin("Validating data...");
        match self.client.validation(&job_id).await {
            Ok(response) => {
                self.finish();
                self.refresh_job_status().await;
                Ok(self.state.validation_results.insert(response))
            }
            Err(e) => Err(self.fail("validation", e)),
        }
    }

    pub async fn start_export(&mut self) -> Result<&ExportResponse, ImpactError> {
        let job_id = self.require_job()?;
        self.begin("Exporting CSV files...");
        match self.client.export(&job_id).await {
            Ok(response) => {
                self.state.current_step = JobStep::Export;
                self.finish();
                self.refresh_job_status().await;
                Ok(self.state.export_results.insert(response))
            }
            Err(e) => Err(self.fail("export", e)),
        }
    }

    /// Save one entity's CSV into `dir` as `<jobId>_<entity>s.csv`.
    pub async fn download_entity_csv(&mut self, entity: EntityType, dir: &Path) -> Result<PathBuf, ImpactError> {
        let job_id = self.require_job()?;
        let target = dir.join(entity.csv_file_name(&job_id));
        let result = match self.client.download_csv(&job_id, entity).await {
            Ok(data) => tokio::fs::write(&target, &data).await.map_err(ImpactError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(job_id = %job_id, entity = %entity, path = %target.display(), "Saved CSV");
                Ok(target)
            }
            Err(e) => {
                warn!(job_id = %job_id, entity = %entity, error = %e, "Download failed");
                self.state.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub async fn sync_to_vector_db(&mut self) -> Result<SyncResponse, ImpactError> {
        let job_id = self.require_job()?;
        self.begin("Syncing to vector database...");
        match self.client.sync_vector_db(&job_id).await {
            Ok(response) => {
                self.finish();
                self.refresh_job_status().await;
                Ok(response)
            }
            Err(e) => Err(self.fail("sync_vector_db", e)),
        }
    }

    /// Poll the job until the backend is no longer working on a step.
    /// Returns the last status seen, or `None` if cancelled first.
    pub async fn wait_until_idle<F>(
        &mut self,
        interval: Duration,
        token: &CancellationToken,
        mut on_update: F,
    ) -> Result<Option<JobStatus>, ImpactError>
    where
        F: FnMut(&PipelineJob),
    {
        let job_id = self.require_job()?;
        loop {
            let job = self.client.job(&job_id).await?;
            on_update(&job);
            let status = job.status;
            self.apply_job(job);
            if !status.is_busy() {
                return Ok(Some(status));
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    pub fn step_status(&self, step: JobStep) -> StepStatus {
        match &self.state.current_job {
            Some(job) => step_status_for_job(job, step),
            None if step == JobStep::Upload => StepStatus::Active,
            None => StepStatus::Pending,
        }
    }

    pub fn is_step_complete(&self, step: JobStep) -> bool {
        self.state
            .current_job
            .as_ref()
            .is_some_and(|job| is_step_completed(job.status, step))
    }

    pub fn can_proceed_to_step(&self, step: JobStep) -> bool {
        can_proceed_to_step(self.state.current_job.as_ref().map(|job| job.status), step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn session() -> JobSession {
        JobSession::new(DocPipelineClient::new(&ClientConfig::default()).unwrap())
    }

    #[test]
    fn test_initial_state() {
        let session = session();
        let state = session.state();
        assert_eq!(state.current_step, JobStep::Upload);
        assert_eq!(state.applied_mappings.len(), 4);
        assert!(state.mapping_suggestions[&EntityType::Story].is_empty());
        assert_eq!(session.step_status(JobStep::Upload), StepStatus::Active);
        assert_eq!(session.step_status(JobStep::Extract), StepStatus::Pending);
        assert!(!session.is_step_complete(JobStep::Upload));
        assert!(session.can_proceed_to_step(JobStep::Upload));
        assert!(!session.can_proceed_to_step(JobStep::Map));
    }

    #[tokio::test]
    async fn test_actions_require_a_job() {
        let mut session = session();
        assert!(matches!(session.start_transformation().await, Err(ImpactError::NoActiveJob)));
        assert!(matches!(session.fetch_preview(EntityType::Epic).await, Err(ImpactError::NoActiveJob)));
        assert!(matches!(session.start_export().await, Err(ImpactError::NoActiveJob)));
        assert_eq!(session.state().error, None);
    }

    #[tokio::test]
    async fn test_refresh_without_job_is_noop() {
        let mut session = session();
        session.refresh_job_status().await;
        assert_eq!(session.state(), &JobSessionState::default());
    }
}
