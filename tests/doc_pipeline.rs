use std::collections::HashMap;

use impactlens::config::ClientConfig;
use impactlens::docpipe::types::ExtractRequest;
use impactlens::docpipe::{
    current_step_from_status, is_step_completed, DocPipelineClient, EntityType, JobSession, JobStatus, JobStep,
    StepStatus, UploadBatch,
};
use impactlens::errors::ImpactError;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DocPipelineClient {
    let config = ClientConfig {
        pipeline_api_url: server.uri(),
        max_retries: 0,
        ..ClientConfig::default()
    };
    DocPipelineClient::new(&config).unwrap()
}

fn job(status: &str, current_step: Value) -> Value {
    json!({
        "job_id": "job-1",
        "job_type": "interactive",
        "status": status,
        "current_step": current_step,
        "steps_completed": [],
        "files_uploaded": [
            {"filename": "estimate.xlsx", "file_path": "/data/job-1/estimate.xlsx", "file_size": 4096,
             "document_type": "estimation", "uploaded_at": "2026-01-05T10:00:00Z"}
        ],
        "extraction_results": null,
        "mapping_results": {"epic": {"Title": "epic_name"}},
        "transformation_results": null,
        "validation_results": null,
        "export_results": null,
        "created_at": "2026-01-05T10:00:00Z",
        "updated_at": "2026-01-05T10:01:00Z",
        "completed_at": null,
        "error_message": null,
        "warnings": [],
        "metadata": {}
    })
}

async fn mount_job(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/jobs/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job(status, Value::Null)))
        .mount(server)
        .await;
}

async fn loaded_session(server: &MockServer, status: &str) -> JobSession {
    mount_job(server, status).await;
    let mut session = JobSession::new(client(server));
    session.load_job("job-1").await.unwrap();
    session
}

#[test]
fn validated_job_is_ready_for_export() {
    assert_eq!(current_step_from_status(JobStatus::Validated), JobStep::Export);
    assert!(is_step_completed(JobStatus::Validated, JobStep::Transform));
    assert!(!is_step_completed(JobStatus::Validated, JobStep::Export));
}

#[tokio::test]
async fn load_job_derives_step_state() {
    let server = MockServer::start().await;
    let session = loaded_session(&server, "validated").await;

    let state = session.state();
    assert_eq!(state.current_step, JobStep::Export);
    assert_eq!(state.uploaded_files.len(), 1);
    assert_eq!(state.applied_mappings[&EntityType::Epic]["Title"], "epic_name");
    assert!(state.applied_mappings[&EntityType::Story].is_empty());
    assert!(session.is_step_complete(JobStep::Transform));
    assert!(!session.is_step_complete(JobStep::Export));
    assert_eq!(session.step_status(JobStep::Export), StepStatus::Active);
    assert!(session.can_proceed_to_step(JobStep::Export));
}

#[tokio::test]
async fn create_job_uploads_and_loads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/pipeline/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-1",
            "status": "uploaded",
            "files_received": [{"filename": "estimate.xlsx", "size": 16, "type": "application/vnd.ms-excel", "document_type": "estimation"}],
            "message": "Files uploaded"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_job(&server, "uploaded").await;

    let dir = tempfile::tempdir().unwrap();
    let sheet = dir.path().join("estimate.xlsx");
    tokio::fs::write(&sheet, b"spreadsheet data").await.unwrap();
    let batch = UploadBatch::from_paths(&[sheet]).await.unwrap();

    let mut session = JobSession::new(client(&server));
    let job_id = session.create_job(batch).await.unwrap();

    assert_eq!(job_id, "job-1");
    let state = session.state();
    assert_eq!(state.current_step, JobStep::Extract);
    assert_eq!(state.job_id.as_deref(), Some("job-1"));
    assert!(!state.is_processing);
    assert!(!state.is_loading);
    assert_eq!(session.step_status(JobStep::Upload), StepStatus::Completed);
}

#[tokio::test]
async fn failed_extraction_keeps_step_and_records_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/pipeline/extract/job-1"))
        .and(body_json(json!({"use_llm_enhancement": true})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "Extractor crashed"})))
        .mount(&server)
        .await;
    let mut session = loaded_session(&server, "uploaded").await;

    let options = ExtractRequest {
        use_llm_enhancement: Some(true),
        llm_confidence_threshold: None,
    };
    let err = session.start_extraction(&options).await.unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    let state = session.state();
    assert_eq!(state.error.as_deref(), Some("Extractor crashed"));
    assert_eq!(state.current_step, JobStep::Extract);
    assert!(!state.is_processing);
    assert_eq!(state.processing_message, None);
}

#[tokio::test]
async fn apply_mapping_sends_bare_map_and_refreshes() {
    let server = MockServer::start().await;
    let mut mappings = HashMap::new();
    mappings.insert("Story Title".to_string(), "title".to_string());

    Mock::given(method("POST"))
        .and(path("/api/v1/pipeline/apply-mapping/job-1"))
        .and(query_param("entity", "story"))
        .and(body_json(json!({"Story Title": "title"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-1", "status": "mapped", "entity": "story", "applied_mappings": {"Story Title": "title"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let mut session = loaded_session(&server, "extracted").await;

    session.apply_entity_mapping(EntityType::Story, mappings).await.unwrap();
    assert_eq!(session.state().applied_mappings[&EntityType::Story]["Story Title"], "title");
    assert_eq!(session.state().error, None);
}

#[tokio::test]
async fn preview_failure_yields_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/preview/job-1"))
        .and(query_param("entity", "epic"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let mut session = loaded_session(&server, "transformed").await;

    let rows = session.fetch_preview(EntityType::Epic).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(session.state().error, None);
}

#[tokio::test]
async fn download_writes_named_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/export/job-1/story"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("id,title\n1,Login\n", "text/csv"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/export/job-1/tdd"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let mut session = loaded_session(&server, "completed").await;
    let dir = tempfile::tempdir().unwrap();

    let saved = session.download_entity_csv(EntityType::Story, dir.path()).await.unwrap();
    assert_eq!(saved, dir.path().join("job-1_storys.csv"));
    assert_eq!(tokio::fs::read_to_string(&saved).await.unwrap(), "id,title\n1,Login\n");

    let err = session.download_entity_csv(EntityType::Tdd, dir.path()).await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to download tdd CSV");
    assert_eq!(session.state().error.as_deref(), Some("Failed to download tdd CSV"));
}

#[tokio::test]
async fn list_jobs_sends_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/jobs"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [{"job_id": "job-1", "job_type": "batch", "status": "failed", "current_step": "map",
                      "created_at": "2026-01-05T10:00:00Z", "updated_at": null, "files_count": 2,
                      "error_message": "Mapping rejected"}],
            "total_count": 11,
            "page": 3,
            "page_size": 5
        })))
        .mount(&server)
        .await;

    let list = client(&server).list_jobs(5, 10).await.unwrap();
    assert_eq!(list.total_count, 11);
    assert_eq!(list.jobs[0].status, JobStatus::Failed);
    assert_eq!(list.jobs[0].current_step, Some(JobStep::Map));
}

#[tokio::test]
async fn actions_without_job_fail_fast() {
    let server = MockServer::start().await;
    let mut session = JobSession::new(client(&server));
    let err = session.sync_to_vector_db().await.unwrap_err();
    assert!(matches!(err, ImpactError::NoActiveJob));
}

#[tokio::test]
async fn job_files_lists_uploaded_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pipeline/jobs/job-1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-1",
            "files": [{"filename": "epic.docx", "file_path": "/data/job-1/epic.docx", "file_size": 2048,
                       "document_type": "epic", "uploaded_at": "2026-01-05T10:00:00Z"}]
        })))
        .mount(&server)
        .await;

    let files = client(&server).job_files("job-1").await.unwrap();
    assert_eq!(files.files.len(), 1);
    assert_eq!(files.files[0].document_type, "epic");
}
