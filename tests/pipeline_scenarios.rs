use impactlens::api::SdlcClient;
use impactlens::config::ClientConfig;
use impactlens::errors::ImpactError;
use impactlens::pipeline::{PipelineStatus, SdlcStore, Stage};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REQUIREMENT: &str = "Add OAuth login to the partner portal";

fn store(server: &MockServer) -> SdlcStore {
    let config = ClientConfig {
        sdlc_api_url: server.uri(),
        max_retries: 0,
        ..ClientConfig::default()
    };
    SdlcStore::new(SdlcClient::new(&config).unwrap())
}

fn event(event_type: &str, data: Value) -> Value {
    json!({"type": event_type, "session_id": "s1", "timestamp": "2026-01-05T10:00:00Z", "data": data})
}

async fn mount_stream(server: &MockServer, events: &[Value]) {
    let body: String = events.iter().map(|e| format!("data: {}\n\n", e)).collect();
    Mock::given(method("POST"))
        .and(path("/api/v1/impact/run-pipeline/stream"))
        .and(body_partial_json(json!({"requirement_text": REQUIREMENT})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn matches_found() -> Value {
    event("agent_complete", json!({
        "agent_name": "historical_match",
        "agent_index": 1,
        "status": "matches_found",
        "progress_percent": 20,
        "output": {"all_matches": [
            {"match_id": "m1", "epic_id": "EPIC-12", "epic_name": "SSO rollout", "match_score": 0.91}
        ]}
    }))
}

#[tokio::test]
async fn completed_run_collects_every_output() {
    let server = MockServer::start().await;
    mount_stream(&server, &[
        event("pipeline_start", json!({})),
        matches_found(),
        event("agent_complete", json!({
            "agent_name": "estimation_effort",
            "agent_index": 4,
            "status": "estimation_effort_completed",
            "progress_percent": 55,
            "output": {"estimation_effort_output": {"total_hours": 40}}
        })),
        event("pipeline_complete", json!({
            "status": "completed",
            "output": {"jira_stories_output": {"story_count": 5}}
        })),
    ])
    .await;

    let store = store(&server);
    store.start_run(REQUIREMENT, None, None).unwrap().wait().await;

    let state = store.pipeline();
    assert_eq!(state.historical_matches.len(), 1);
    assert_eq!(state.estimation_effort.as_ref().unwrap().total_hours, 40.0);
    assert_eq!(state.stories.as_ref().unwrap().story_count, 5);
    assert_eq!(state.status, Some(PipelineStatus::Completed));
    assert!(!state.is_running);
    assert_eq!(state.error, None);

    let streaming = store.streaming();
    assert!(!streaming.is_streaming);
    assert_eq!(streaming.progress_percent, 100);
    assert_eq!(streaming.completed_agent_names, vec!["historical_match", "estimation_effort"]);
    assert!(store.is_stage_complete(Stage::JiraStories));
}

#[tokio::test]
async fn failed_run_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_stream(&server, &[
        event("pipeline_start", json!({})),
        matches_found(),
        event("pipeline_error", json!({"error": "Estimation agent failed"})),
    ])
    .await;

    let store = store(&server);
    store.start_run(REQUIREMENT, None, None).unwrap().wait().await;

    let state = store.pipeline();
    assert_eq!(state.historical_matches[0].epic_name, "SSO rollout");
    assert_eq!(state.status, Some(PipelineStatus::Error));
    assert_eq!(state.error.as_deref(), Some("Estimation agent failed"));
    assert!(!state.is_running);
    assert!(state.estimation_effort.is_none());
    assert!(store.is_stage_complete(Stage::HistoricalMatches));
    assert!(!store.is_stage_complete(Stage::EstimationSheet));
    assert_eq!(store.streaming().progress_percent, 20);
}

#[tokio::test]
async fn unrecognised_statuses_do_not_lose_events() {
    let server = MockServer::start().await;
    mount_stream(&server, &[
        event("pipeline_start", json!({})),
        event("agent_complete", json!({
            "agent_name": "requirement",
            "status": "requirement_parsed",
            "output": {"all_matches": [{"match_id": "m1", "epic_name": "SSO rollout"}]}
        })),
        event("pipeline_complete", json!({"status": "done"})),
    ])
    .await;

    let store = store(&server);
    store.start_run(REQUIREMENT, None, None).unwrap().wait().await;

    let state = store.pipeline();
    assert_eq!(state.historical_matches[0].epic_name, "SSO rollout");
    assert_eq!(state.status, Some(PipelineStatus::Completed));
    assert_eq!(state.error, None);
    assert!(!state.is_running);
}

#[tokio::test]
async fn short_requirement_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store(&server);
    let err = store.start_run("Add SSO", None, None).err().unwrap();
    assert!(matches!(err, ImpactError::Validation(_)));
    assert_eq!(store.pipeline().status, None);
}

#[tokio::test]
async fn backend_rejection_lands_in_error_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/impact/run-pipeline/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "Ollama unavailable"})))
        .mount(&server)
        .await;

    let store = store(&server);
    store.start_run(REQUIREMENT, Some("EPIC-9".into()), None).unwrap().wait().await;

    let state = store.pipeline();
    assert_eq!(state.status, Some(PipelineStatus::Error));
    assert_eq!(state.error.as_deref(), Some("Ollama unavailable"));
    assert_eq!(state.jira_epic_id.as_deref(), Some("EPIC-9"));
}

#[tokio::test]
async fn load_session_by_id_replaces_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/impact/s7/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s7",
            "status": "tdd_generated",
            "historical_matches": [{"match_id": "m1"}],
            "tdd_output": {"tdd_name": "OAuth TDD"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/impact/gone/summary"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Session not found"})))
        .mount(&server)
        .await;

    let store = store(&server);
    store.load_session_by_id("s7").await.unwrap();
    let state = store.pipeline();
    assert_eq!(state.session_id.as_deref(), Some("s7"));
    assert_eq!(state.design_doc.unwrap().tdd_name, "OAuth TDD");
    assert!(store.is_stage_complete(Stage::TddGeneration));
    assert!(!store.is_stage_complete(Stage::JiraStories));
    assert_eq!(store.display_progress(), 60);

    assert!(store.load_session_by_id("gone").await.is_err());
    assert_eq!(store.pipeline().error.as_deref(), Some("Session not found"));
}
