use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::errors::ImpactError;

/// Fine-grained backend status of a document job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Uploading,
    Uploaded,
    Extracting,
    Extracted,
    Mapping,
    Mapped,
    Transforming,
    Transformed,
    Validating,
    Validated,
    Exporting,
    Completed,
    Failed,
}

/// Forward order of every non-failure status.
pub static JOB_STATUS_ORDER: &[JobStatus] = &[
    JobStatus::Created,
    JobStatus::Uploading,
    JobStatus::Uploaded,
    JobStatus::Extracting,
    JobStatus::Extracted,
    JobStatus::Mapping,
    JobStatus::Mapped,
    JobStatus::Transforming,
    JobStatus::Transformed,
    JobStatus::Validating,
    JobStatus::Validated,
    JobStatus::Exporting,
    JobStatus::Completed,
];

impl JobStatus {
    /// Position in [`JOB_STATUS_ORDER`]; `None` for `Failed`.
    pub fn rank(&self) -> Option<usize> {
        JOB_STATUS_ORDER.iter().position(|s| s == self)
    }

    /// Backend is working on a step right now.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Uploading | Self::Extracting | Self::Mapping | Self::Transforming | Self::Validating | Self::Exporting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Mapping => "mapping",
            Self::Mapped => "mapped",
            Self::Transforming => "transforming",
            Self::Transformed => "transformed",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Exporting => "exporting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend step token. `Validate` is folded into `Transform` for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    Upload,
    Extract,
    Map,
    Transform,
    Validate,
    Export,
}

impl JobStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Extract => "extract",
            Self::Map => "map",
            Self::Transform => "transform",
            Self::Validate => "validate",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Interactive,
    Batch,
}

/// Target schema entities produced by the transform step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Epic,
    Estimation,
    Tdd,
    Story,
}

pub static ENTITY_TYPES: &[EntityType] = &[
    EntityType::Epic,
    EntityType::Estimation,
    EntityType::Tdd,
    EntityType::Story,
];

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Estimation => "estimation",
            Self::Tdd => "tdd",
            Self::Story => "story",
        }
    }

    /// File name the export endpoint's CSV is saved under.
    pub fn csv_file_name(&self, job_id: &str) -> String {
        format!("{}_{}s.csv", job_id, self.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ImpactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "epic" | "epics" => Ok(Self::Epic),
            "estimation" | "estimations" => Ok(Self::Estimation),
            "tdd" | "tdds" => Ok(Self::Tdd),
            "story" | "stories" => Ok(Self::Story),
            other => Err(ImpactError::Validation(format!(
                "Unknown entity '{}'. Expected one of: epic, estimation, tdd, story",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub document_type: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionResult {
    pub document_type: String,
    pub fields_count: u32,
    pub tables_count: u32,
    pub jira_ids: Vec<String>,
    pub emails: Vec<String>,
    pub confidence: f64,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationIssue {
    pub entity: String,
    pub row: u32,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResponse {
    pub job_id: String,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub relationship_integrity: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportResult {
    pub files_exported: u32,
    pub total_records: u64,
    pub export_path: String,
}

/// Full job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineJob {
    pub job_id: String,
    #[serde(default)]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub current_step: Option<JobStep>,
    #[serde(default)]
    pub steps_completed: Vec<JobStep>,
    #[serde(default)]
    pub files_uploaded: Vec<FileInfo>,
    #[serde(default)]
    pub extraction_results: Option<HashMap<String, ExtractionResult>>,
    #[serde(default)]
    pub mapping_results: Option<HashMap<String, HashMap<String, String>>>,
    #[serde(default)]
    pub transformation_results: Option<Map<String, Value>>,
    #[serde(default)]
    pub validation_results: Option<ValidationResponse>,
    #[serde(default)]
    pub export_results: Option<ExportResult>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceivedFile {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub document_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: String,
    pub files_received: Vec<ReceivedFile>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFilesResponse {
    pub job_id: String,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_llm_enhancement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_confidence_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractResponse {
    pub job_id: String,
    pub status: String,
    pub extractions: HashMap<String, ExtractionResult>,
    pub overall_confidence: f64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSuggestion {
    pub source_field: String,
    pub target_field: String,
    pub confidence: f64,
    pub source_value: Value,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSuggestionsResponse {
    pub job_id: String,
    pub entity_type: String,
    pub suggestions: Vec<MappingSuggestion>,
    pub unmapped_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyMappingResponse {
    pub job_id: String,
    pub status: String,
    pub entity: String,
    pub applied_mappings: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformResponse {
    pub job_id: String,
    pub status: String,
    pub records_created: HashMap<String, u64>,
    pub relationship_summary: Map<String, Value>,
    pub validation_warnings: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewResponse {
    pub job_id: String,
    pub entity: String,
    pub data: Vec<Map<String, Value>>,
    pub total_count: u64,
    pub validation_results: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportedFile {
    pub entity: String,
    pub file_path: String,
    pub record_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportResponse {
    pub job_id: String,
    pub status: String,
    pub files_exported: Vec<ExportedFile>,
    pub total_records: u64,
    pub export_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncedFile {
    pub entity: String,
    pub new_records: u64,
    pub target_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    pub job_id: String,
    pub status: String,
    pub synced_files: Vec<SyncedFile>,
    pub message: String,
    pub next_step: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListItem {
    pub job_id: String,
    #[serde(default)]
    pub job_type: JobType,
    pub status: JobStatus,
    #[serde(default)]
    pub current_step: Option<JobStep>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub files_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobListResponse {
    pub jobs: Vec<JobListItem>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocHealthResponse {
    pub status: String,
    pub version: String,
    pub ollama_status: String,
    pub disk_space_mb: Option<f64>,
    pub timestamp: String,
}
