use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use crate::api::types::{PipelineRequest, PipelineResponse, StreamEvent};
use crate::api::{generate_session_id, validate_requirement, SdlcClient, StreamCallbacks, StreamHandle, StreamTransport};
use crate::errors::ImpactError;
use super::reducer::{reduce, PipelineSnapshot, RunEvent};
use super::state::{PipelineState, StreamingState};
use super::status::{Stage, StageCompletion};

/// How [`SdlcStore::follow`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run completed or failed.
    Settled,
    /// The stream task exited while the run was still in flight.
    StreamLost,
    /// The interrupt fired and the stream was cancelled.
    Interrupted,
}

/// Owns the session state for the life of the application. All writes go
/// through the watch sender; readers subscribe or take snapshots.
#[derive(Clone)]
pub struct SdlcStore {
    state: Arc<watch::Sender<PipelineSnapshot>>,
    /// Bumped under the watch lock on every start/reset/load.
    generation: Arc<AtomicU64>,
    transport: StreamTransport,
    client: SdlcClient,
}

impl SdlcStore {
    pub fn new(client: SdlcClient) -> Self {
        let (state, _) = watch::channel(PipelineSnapshot::default());
        Self {
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            transport: StreamTransport::new(client.clone()),
            client,
        }
    }

    /// Start a streaming run. Callbacks from any earlier run are ignored
    /// from here on, whether or not its handle was cancelled.
    pub fn start_run(
        &self,
        requirement_text: &str,
        jira_epic_id: Option<String>,
        selected_match_ids: Option<Vec<String>>,
    ) -> Result<StreamHandle, ImpactError> {
        let (request, callbacks) = self.prepare_run(requirement_text, jira_epic_id, selected_match_ids)?;
        Ok(self.transport.start(&request, callbacks))
    }

    fn prepare_run(
        &self,
        requirement_text: &str,
        jira_epic_id: Option<String>,
        selected_match_ids: Option<Vec<String>>,
    ) -> Result<(PipelineRequest, RunCallbacks), ImpactError> {
        validate_requirement(requirement_text)?;

        let request = PipelineRequest {
            session_id: generate_session_id(),
            requirement_text: requirement_text.to_string(),
            jira_epic_id: jira_epic_id.filter(|id| !id.trim().is_empty()),
            selected_match_ids,
        };

        let mut run = 0;
        self.state.send_modify(|snapshot| {
            run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            snapshot.begin_run(&request.session_id, &request.requirement_text, request.jira_epic_id.clone());
        });
        info!(session_id = %request.session_id, run = run, "Starting pipeline run");

        let callbacks = RunCallbacks {
            state: self.state.clone(),
            generation: self.generation.clone(),
            run,
        };
        Ok((request, callbacks))
    }

    /// Back to the empty initial state. Cancel any open handle first.
    pub fn reset_pipeline(&self) {
        self.state.send_modify(|snapshot| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *snapshot = PipelineSnapshot::default();
        });
        debug!("Pipeline state reset");
    }

    /// Replace everything with a previously completed session.
    pub fn load_session(&self, response: PipelineResponse) {
        let pipeline = PipelineState::from_response(response);
        info!(session_id = ?pipeline.session_id, status = ?pipeline.status, "Loaded session");
        self.state.send_modify(|snapshot| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *snapshot = PipelineSnapshot {
                pipeline,
                streaming: StreamingState::default(),
            };
        });
    }

    /// Fetch a session summary and load it. A failed fetch lands in the
    /// error field and is also returned.
    pub async fn load_session_by_id(&self, session_id: &str) -> Result<(), ImpactError> {
        match self.client.pipeline_summary(session_id).await {
            Ok(response) => {
                self.load_session(response);
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load session");
                let message = e.user_message();
                self.state.send_modify(|snapshot| snapshot.pipeline.error = Some(message));
                Err(e)
            }
        }
    }

    /// Drive a started run to its end, handing each snapshot to `on_update`.
    /// Resolving `interrupt` cancels the stream.
    pub async fn follow<I, F>(&self, handle: &mut StreamHandle, interrupt: I, mut on_update: F) -> RunOutcome
    where
        I: Future<Output = ()>,
        F: FnMut(&PipelineSnapshot),
    {
        let mut rx = self.subscribe();
        let mut interrupt = std::pin::pin!(interrupt);

        loop {
            let snapshot = rx.borrow_and_update().clone();
            on_update(&snapshot);
            if !snapshot.pipeline.is_running {
                return RunOutcome::Settled;
            }

            tokio::select! {
                _ = rx.changed() => {}
                _ = handle.finished() => {
                    let snapshot = self.snapshot();
                    on_update(&snapshot);
                    if snapshot.pipeline.is_running {
                        warn!(session_id = ?snapshot.pipeline.session_id, "Stream ended while the run was in flight");
                        return RunOutcome::StreamLost;
                    }
                    return RunOutcome::Settled;
                }
                _ = &mut interrupt => {
                    handle.cancel();
                    return RunOutcome::Interrupted;
                }
            }
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.borrow().clone()
    }

    pub fn pipeline(&self) -> PipelineState {
        self.state.borrow().pipeline.clone()
    }

    pub fn streaming(&self) -> StreamingState {
        self.state.borrow().streaming.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.state.subscribe()
    }

    pub fn stage_completion(&self) -> StageCompletion {
        self.state.borrow().stage_completion()
    }

    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        self.stage_completion().get(stage)
    }

    pub fn display_progress(&self) -> u8 {
        self.state.borrow().display_progress()
    }
}

/// Transport callbacks bound to one run's generation.
pub struct RunCallbacks {
    state: Arc<watch::Sender<PipelineSnapshot>>,
    generation: Arc<AtomicU64>,
    run: u64,
}

impl RunCallbacks {
    fn apply(&self, event: RunEvent<'_>) {
        let run = self.run;
        self.state.send_if_modified(|snapshot| {
            let active = self.generation.load(Ordering::SeqCst);
            if active != run {
                debug!(run = run, active = active, "Dropping callback from stale run");
                return false;
            }
            reduce(snapshot, event)
        });
    }
}

impl StreamCallbacks for RunCallbacks {
    fn on_start(&mut self, _event: &StreamEvent) {
        self.apply(RunEvent::Started);
    }

    fn on_agent_complete(&mut self, event: &StreamEvent) {
        self.apply(RunEvent::AgentCompleted(event));
    }

    fn on_complete(&mut self, event: &StreamEvent) {
        self.apply(RunEvent::Completed(event));
    }

    fn on_error(&mut self, error: ImpactError) {
        let message = error.user_message();
        self.apply(RunEvent::Failed(&message));
    }
}
