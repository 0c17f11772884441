pub mod client;
pub mod session;
pub mod steps;
pub mod types;
pub mod upload;

pub use client::DocPipelineClient;
pub use session::{JobSession, JobSessionState};
pub use steps::{can_proceed_to_step, current_step_from_status, is_step_completed, step_status, StepStatus, PIPELINE_STEPS};
pub use types::{EntityType, JobStatus, JobStep, PipelineJob, ENTITY_TYPES};
pub use upload::{DocumentKind, UploadBatch};
