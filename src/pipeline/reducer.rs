use serde::Serialize;
use tracing::debug;
use crate::api::types::StreamEvent;
use super::agents::{agent_position, AGENTS};
use super::state::{PipelineState, StreamingState};
use super::status::{status_progress_percent, PipelineStatus, StageCompletion};

/// Everything a view needs to render one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub pipeline: PipelineState,
    pub streaming: StreamingState,
}

/// Lifecycle input to [`reduce`], one per transport callback.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    Started,
    AgentCompleted(&'a StreamEvent),
    Completed(&'a StreamEvent),
    Failed(&'a str),
}

impl PipelineSnapshot {
    /// Clear prior results and mark a new run as in flight.
    pub fn begin_run(&mut self, session_id: &str, requirement_text: &str, jira_epic_id: Option<String>) {
        *self = Self {
            pipeline: PipelineState {
                is_running: true,
                session_id: Some(session_id.to_string()),
                status: Some(PipelineStatus::Created),
                requirement_text: requirement_text.to_string(),
                jira_epic_id,
                ..Default::default()
            },
            streaming: StreamingState {
                is_streaming: true,
                ..Default::default()
            },
        };
    }

    pub fn stage_completion(&self) -> StageCompletion {
        self.pipeline.stages
    }

    /// Streamed percentage while it is ahead, else the status position.
    pub fn display_progress(&self) -> u8 {
        if self.streaming.is_streaming {
            return self.streaming.progress_percent;
        }
        self.streaming
            .progress_percent
            .max(status_progress_percent(self.pipeline.status))
    }
}

/// Fold one event into the snapshot. Returns whether anything changed.
/// Once a run has completed or failed the snapshot is frozen.
pub fn reduce(snapshot: &mut PipelineSnapshot, event: RunEvent<'_>) -> bool {
    if !snapshot.pipeline.is_running {
        debug!(status = ?snapshot.pipeline.status, "Ignoring event for a run that is not in flight");
        return false;
    }

    match event {
        RunEvent::Started => {
            let streaming = &mut snapshot.streaming;
            streaming.is_streaming = true;
            streaming.current_agent_index = Some(0);
            streaming.current_agent_name = AGENTS.first().map(|a| a.name.to_string());
        }
        RunEvent::AgentCompleted(event) => {
            let data = &event.data;
            if let Some(output) = &data.output {
                snapshot.pipeline.merge_output(output);
            }
            if let Some(incoming) = data.status {
                advance_status(&mut snapshot.pipeline, incoming);
                snapshot.pipeline.stages.absorb(snapshot.pipeline.status);
            }

            let streaming = &mut snapshot.streaming;
            if let Some(name) = &data.agent_name {
                streaming.completed_agent_names.push(name.clone());
            }
            let finished = data
                .agent_index
                .or_else(|| data.agent_name.as_deref().and_then(agent_position));
            if let Some(finished) = finished {
                let next = finished + 1;
                streaming.current_agent_index = Some(next);
                streaming.current_agent_name = AGENTS.get(next).map(|a| a.name.to_string());
            }
            if let Some(percent) = data.progress_percent {
                streaming.progress_percent = streaming.progress_percent.max(clamp_percent(percent));
            }
        }
        RunEvent::Completed(event) => {
            let data = &event.data;
            if let Some(output) = &data.output {
                snapshot.pipeline.merge_output(output);
            }
            snapshot.pipeline.is_running = false;
            snapshot.pipeline.status = Some(data.status.unwrap_or(PipelineStatus::Completed));
            snapshot.pipeline.stages.absorb(snapshot.pipeline.status);
            snapshot.streaming.is_streaming = false;
            snapshot.streaming.progress_percent = 100;
        }
        RunEvent::Failed(message) => {
            snapshot.pipeline.is_running = false;
            snapshot.pipeline.status = Some(PipelineStatus::Error);
            snapshot.pipeline.error = Some(message.to_string());
            snapshot.streaming.is_streaming = false;
        }
    }
    true
}

fn advance_status(pipeline: &mut PipelineState, incoming: PipelineStatus) {
    match pipeline.status {
        Some(current) if !current.allows_transition_to(incoming) => {
            debug!(current = %current, incoming = %incoming, "Ignoring out-of-order status");
        }
        _ => pipeline.status = Some(incoming),
    }
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> StreamEvent {
        serde_json::from_value(value).unwrap()
    }

    fn running() -> PipelineSnapshot {
        let mut snapshot = PipelineSnapshot::default();
        snapshot.begin_run("s1", "Add OAuth login to the partner portal", None);
        snapshot
    }

    #[test]
    fn test_begin_run_clears_previous_results() {
        let mut snapshot = PipelineSnapshot::default();
        snapshot.pipeline.error = Some("old".into());
        snapshot.pipeline.messages.push(Default::default());
        snapshot.streaming.completed_agent_names.push("requirement".into());

        snapshot.begin_run("s2", "text", Some("EPIC-1".into()));
        assert!(snapshot.pipeline.is_running);
        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::Created));
        assert_eq!(snapshot.pipeline.error, None);
        assert!(snapshot.pipeline.messages.is_empty());
        assert!(snapshot.streaming.is_streaming);
        assert!(snapshot.streaming.completed_agent_names.is_empty());
        assert_eq!(snapshot.pipeline.jira_epic_id.as_deref(), Some("EPIC-1"));
    }

    #[test]
    fn test_start_points_at_first_agent() {
        let mut snapshot = running();
        assert!(reduce(&mut snapshot, RunEvent::Started));
        assert_eq!(snapshot.streaming.current_agent_index, Some(0));
        assert_eq!(snapshot.streaming.current_agent_name.as_deref(), Some("requirement"));
    }

    #[test]
    fn test_agent_complete_points_at_next_agent() {
        let mut snapshot = running();
        let e = event(json!({"type": "agent_complete", "data": {"agent_name": "historical_match", "agent_index": 1}}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        assert_eq!(snapshot.streaming.current_agent_index, Some(2));
        assert_eq!(snapshot.streaming.current_agent_name.as_deref(), Some("auto_select"));
        assert_eq!(snapshot.streaming.completed_agent_names, vec!["historical_match"]);
    }

    #[test]
    fn test_agent_index_inferred_from_name() {
        let mut snapshot = running();
        let e = event(json!({"type": "agent_complete", "data": {"agent_name": "risks"}}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        assert_eq!(snapshot.streaming.current_agent_index, Some(AGENTS.len()));
        assert_eq!(snapshot.streaming.current_agent_name, None);
    }

    #[test]
    fn test_redelivered_agent_is_appended_again() {
        let mut snapshot = running();
        let e = event(json!({"type": "agent_complete", "data": {"agent_name": "requirement", "agent_index": 0}}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        assert_eq!(snapshot.streaming.completed_agent_names.len(), 2);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut snapshot = running();
        let mut seen = Vec::new();
        for pct in [json!(10), json!(null), json!(35.6), json!(20), json!(140)] {
            let e = event(json!({"type": "agent_complete", "data": {"progress_percent": pct}}));
            reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
            seen.push(snapshot.streaming.progress_percent);
        }
        assert_eq!(seen, vec![10, 10, 36, 36, 100]);
    }

    #[test]
    fn test_out_of_order_status_ignored() {
        let mut snapshot = running();
        let later = event(json!({"type": "agent_complete", "data": {"status": "tdd_generated"}}));
        let earlier = event(json!({"type": "agent_complete", "data": {"status": "matches_found"}}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&later));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&earlier));
        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::TddGenerated));
    }

    #[test]
    fn test_complete_without_status_defaults_to_completed() {
        let mut snapshot = running();
        let e = event(json!({"type": "pipeline_complete", "data": {}}));
        reduce(&mut snapshot, RunEvent::Completed(&e));
        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::Completed));
        assert!(!snapshot.pipeline.is_running);
        assert!(!snapshot.streaming.is_streaming);
        assert_eq!(snapshot.streaming.progress_percent, 100);
        assert_eq!(snapshot.display_progress(), 100);
    }

    #[test]
    fn test_complete_status_is_authoritative() {
        let mut snapshot = running();
        let e = event(json!({"type": "pipeline_complete", "data": {"status": "risks_generated"}}));
        reduce(&mut snapshot, RunEvent::Completed(&e));
        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::RisksGenerated));
        assert_eq!(snapshot.streaming.progress_percent, 100);
    }

    #[test]
    fn test_failure_keeps_partial_results() {
        let mut snapshot = running();
        let e = event(json!({"type": "agent_complete", "data": {
            "status": "matches_found",
            "output": {"all_matches": [{"match_id": "m1"}]}
        }}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        reduce(&mut snapshot, RunEvent::Failed("backend exploded"));

        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::Error));
        assert_eq!(snapshot.pipeline.error.as_deref(), Some("backend exploded"));
        assert_eq!(snapshot.pipeline.historical_matches.len(), 1);
        assert!(!snapshot.pipeline.is_running);
    }

    #[test]
    fn test_failure_keeps_reached_stages() {
        let mut snapshot = running();
        let e = event(json!({"type": "agent_complete", "data": {
            "status": "matches_found",
            "output": {"all_matches": [{"match_id": "m1"}]}
        }}));
        reduce(&mut snapshot, RunEvent::AgentCompleted(&e));
        assert!(snapshot.stage_completion().historical_matches);

        reduce(&mut snapshot, RunEvent::Failed("boom"));
        let completion = snapshot.stage_completion();
        assert!(completion.historical_matches);
        assert!(!completion.estimation_sheet);
    }

    #[test]
    fn test_begin_run_clears_reached_stages() {
        let mut snapshot = running();
        let done = event(json!({"type": "pipeline_complete", "data": {}}));
        reduce(&mut snapshot, RunEvent::Completed(&done));
        assert!(snapshot.stage_completion().jira_stories);

        snapshot.begin_run("s2", "Add OAuth login to the partner portal", None);
        assert_eq!(snapshot.stage_completion(), StageCompletion::default());
    }

    #[test]
    fn test_events_after_complete_are_ignored() {
        let mut snapshot = running();
        let done = event(json!({"type": "pipeline_complete", "data": {"status": "risks_generated"}}));
        reduce(&mut snapshot, RunEvent::Completed(&done));
        assert!(!reduce(&mut snapshot, RunEvent::Failed("late")));
        assert_eq!(snapshot.pipeline.error, None);
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let mut snapshot = running();
        reduce(&mut snapshot, RunEvent::Failed("boom"));
        let e = event(json!({"type": "agent_complete", "data": {"status": "matches_found"}}));
        assert!(!reduce(&mut snapshot, RunEvent::AgentCompleted(&e)));
        assert_eq!(snapshot.pipeline.status, Some(PipelineStatus::Error));
    }
}
