use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use crate::pipeline::status::PipelineStatus;

/// Body of both run-pipeline endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub session_id: String,
    pub requirement_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jira_epic_id: Option<String>,
    #[serde(rename = "selected_matches", skip_serializing_if = "Option::is_none")]
    pub selected_match_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    High,
    Medium,
    Low,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::High => "HIGH",
            Level::Medium => "MEDIUM",
            Level::Low => "LOW",
            Level::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBreakdown {
    pub semantic_score: f64,
    pub keyword_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalMatch {
    pub match_id: String,
    pub epic_id: String,
    pub epic_name: String,
    pub description: String,
    pub match_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub technologies: Vec<String>,
    pub actual_hours: f64,
    pub estimated_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactedModule {
    pub name: String,
    pub impact: Level,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactedModulesOutput {
    pub functional_modules: Vec<ImpactedModule>,
    pub technical_modules: Vec<ImpactedModule>,
    pub total_modules: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortBreakdown {
    pub category: String,
    pub dev_hours: f64,
    pub qa_hours: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationEffortOutput {
    pub total_dev_hours: f64,
    pub total_qa_hours: f64,
    pub total_hours: f64,
    pub story_points: f64,
    pub confidence: Level,
    pub breakdown: Vec<EffortBreakdown>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TddOutput {
    pub session_id: String,
    pub agent: String,
    pub tdd_name: String,
    pub tdd_description: String,
    pub technical_components: Vec<String>,
    pub design_decisions: String,
    pub architecture_pattern: String,
    pub security_considerations: String,
    pub performance_requirements: String,
    pub tdd_dependencies: Vec<String>,
    pub markdown_content: String,
    pub markdown_file_path: Option<String>,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraStory {
    pub story_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub story_type: String,
    pub story_points: f64,
    pub acceptance_criteria: Vec<String>,
    pub priority: Level,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraStoriesOutput {
    pub stories: Vec<JiraStory>,
    pub total_story_points: f64,
    pub story_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeImpactFile {
    pub file_id: String,
    pub file_path: String,
    pub repository: String,
    pub change_type: String,
    pub language: String,
    pub reason: String,
    pub estimated_lines: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeImpactOutput {
    pub files: Vec<CodeImpactFile>,
    pub repositories_affected: Vec<String>,
    pub total_files: u32,
    pub total_estimated_lines: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Risk {
    pub risk_id: String,
    pub title: String,
    pub description: String,
    pub severity: Level,
    pub likelihood: Level,
    pub category: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RisksOutput {
    pub risks: Vec<Risk>,
    pub high_severity_count: u32,
    pub total_risks: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Full response of the synchronous run and of a session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub session_id: String,
    pub status: PipelineStatus,
    #[serde(default)]
    pub impacted_modules_output: Option<ImpactedModulesOutput>,
    #[serde(default)]
    pub estimation_effort_output: Option<EstimationEffortOutput>,
    #[serde(default)]
    pub tdd_output: Option<TddOutput>,
    #[serde(default)]
    pub jira_stories_output: Option<JiraStoriesOutput>,
    #[serde(default)]
    pub code_impact_output: Option<CodeImpactOutput>,
    #[serde(default)]
    pub risks_output: Option<RisksOutput>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub historical_matches: Vec<HistoricalMatch>,
    #[serde(default)]
    pub requirement_text: Option<String>,
    #[serde(default)]
    pub extracted_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ollama: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleRequirement {
    pub requirement_text: String,
    pub jira_epic_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    PipelineStart,
    AgentComplete,
    PipelineComplete,
    PipelineError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEventData {
    pub agent_name: Option<String>,
    pub agent_index: Option<usize>,
    pub total_agents: Option<usize>,
    #[serde(deserialize_with = "lenient_status")]
    pub status: Option<PipelineStatus>,
    pub output: Option<Map<String, Value>>,
    pub error: Option<String>,
    pub progress_percent: Option<f64>,
}

/// Statuses this client does not know decode as `None`, keeping the rest
/// of the event.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<PipelineStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(raw.clone()) {
        Ok(status) => Ok(Some(status)),
        Err(_) => {
            debug!(status = %raw, "Ignoring unknown pipeline status");
            Ok(None)
        }
    }
}

/// One decoded server-sent event from the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub data: StreamEventData,
}
