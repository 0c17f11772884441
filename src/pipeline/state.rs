use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;
use crate::api::types::{
    ChatMessage, CodeImpactOutput, EstimationEffortOutput, HistoricalMatch, ImpactedModulesOutput,
    JiraStoriesOutput, PipelineResponse, RisksOutput, TddOutput,
};
use super::status::{PipelineStatus, StageCompletion};

/// Authoritative snapshot of one assessment session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineState {
    pub is_running: bool,
    pub session_id: Option<String>,
    pub status: Option<PipelineStatus>,
    pub error: Option<String>,
    pub requirement_text: String,
    pub jira_epic_id: Option<String>,
    pub historical_matches: Vec<HistoricalMatch>,
    pub impacted_modules: Option<ImpactedModulesOutput>,
    pub estimation_effort: Option<EstimationEffortOutput>,
    pub design_doc: Option<TddOutput>,
    pub stories: Option<JiraStoriesOutput>,
    pub code_impact: Option<CodeImpactOutput>,
    pub risks: Option<RisksOutput>,
    pub messages: Vec<ChatMessage>,
    /// Stages this session has reached. Survives a failed run.
    pub stages: StageCompletion,
}

impl PipelineState {
    /// Overwrite each result that `output` carries; keep every other one.
    pub fn merge_output(&mut self, output: &Map<String, Value>) {
        // Matches arrive as `all_matches` mid-stream and `historical_matches` at the end.
        let matches = take::<Vec<HistoricalMatch>>(output, "all_matches")
            .or_else(|| take(output, "historical_matches"));
        if let Some(matches) = matches {
            self.historical_matches = matches;
        }
        if let Some(v) = take(output, "impacted_modules_output") {
            self.impacted_modules = Some(v);
        }
        if let Some(v) = take(output, "estimation_effort_output") {
            self.estimation_effort = Some(v);
        }
        if let Some(v) = take(output, "tdd_output") {
            self.design_doc = Some(v);
        }
        if let Some(v) = take(output, "jira_stories_output") {
            self.stories = Some(v);
        }
        if let Some(v) = take(output, "code_impact_output") {
            self.code_impact = Some(v);
        }
        if let Some(v) = take(output, "risks_output") {
            self.risks = Some(v);
        }
        if let Some(v) = take(output, "messages") {
            self.messages = v;
        }
    }

    /// Wholesale replacement from a finished session.
    pub fn from_response(response: PipelineResponse) -> Self {
        Self {
            is_running: false,
            session_id: Some(response.session_id),
            status: Some(response.status),
            error: response.error_message,
            requirement_text: response.requirement_text.unwrap_or_default(),
            jira_epic_id: None,
            historical_matches: response.historical_matches,
            impacted_modules: response.impacted_modules_output,
            estimation_effort: response.estimation_effort_output,
            design_doc: response.tdd_output,
            stories: response.jira_stories_output,
            code_impact: response.code_impact_output,
            risks: response.risks_output,
            messages: response.messages,
            stages: StageCompletion::from_status(Some(response.status)),
        }
    }
}

/// `null` and undecodable values count as absent.
fn take<T: DeserializeOwned>(output: &Map<String, Value>, key: &str) -> Option<T> {
    let value = output.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key = key, error = %e, "Ignoring undecodable stage output");
            None
        }
    }
}

/// Transient progress of the active stream. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamingState {
    pub is_streaming: bool,
    /// Next agent expected to finish, not the one that just did.
    pub current_agent_index: Option<usize>,
    pub current_agent_name: Option<String>,
    pub completed_agent_names: Vec<String>,
    pub progress_percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut state = PipelineState::default();
        state.merge_output(&output(json!({
            "all_matches": [{"match_id": "m1", "epic_name": "SSO rollout", "match_score": 0.91}],
            "estimation_effort_output": {"total_hours": 40}
        })));
        state.merge_output(&output(json!({
            "tdd_output": {"tdd_name": "OAuth TDD"},
            "estimation_effort_output": null
        })));

        assert_eq!(state.historical_matches.len(), 1);
        assert_eq!(state.estimation_effort.as_ref().unwrap().total_hours, 40.0);
        assert_eq!(state.design_doc.as_ref().unwrap().tdd_name, "OAuth TDD");
    }

    #[test]
    fn test_all_matches_preferred_over_historical_matches() {
        let mut state = PipelineState::default();
        state.merge_output(&output(json!({
            "all_matches": [{"match_id": "a"}, {"match_id": "b"}],
            "historical_matches": [{"match_id": "c"}]
        })));
        assert_eq!(state.historical_matches.len(), 2);

        state.merge_output(&output(json!({"historical_matches": [{"match_id": "c"}]})));
        assert_eq!(state.historical_matches[0].match_id, "c");
    }

    #[test]
    fn test_undecodable_value_keeps_previous() {
        let mut state = PipelineState::default();
        state.merge_output(&output(json!({"risks_output": {"total_risks": 3}})));
        state.merge_output(&output(json!({"risks_output": "not an object"})));
        assert_eq!(state.risks.unwrap().total_risks, 3);
    }

    #[test]
    fn test_from_response() {
        let response: PipelineResponse = serde_json::from_value(json!({
            "session_id": "s2",
            "status": "completed",
            "jira_stories_output": {"story_count": 8},
            "messages": [{"role": "assistant", "content": "done"}],
            "requirement_text": "Add SSO"
        })).unwrap();
        let state = PipelineState::from_response(response);
        assert_eq!(state.session_id.as_deref(), Some("s2"));
        assert_eq!(state.status, Some(PipelineStatus::Completed));
        assert_eq!(state.stories.unwrap().story_count, 8);
        assert_eq!(state.messages.len(), 1);
        assert!(!state.is_running);
    }
}
