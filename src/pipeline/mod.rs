pub mod agents;
pub mod reducer;
pub mod state;
pub mod status;
pub mod store;

pub use agents::{AgentDescriptor, AGENTS};
pub use reducer::{reduce, PipelineSnapshot, RunEvent};
pub use state::{PipelineState, StreamingState};
pub use status::{is_stage_complete, PipelineStatus, Stage, StageCompletion, STAGES, STATUS_ORDER};
pub use store::{RunCallbacks, RunOutcome, SdlcStore};
