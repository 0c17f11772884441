pub mod client;
pub(crate) mod http;
pub mod sse;
pub mod stream;
pub mod types;
pub mod validation;

pub use client::{SdlcClient, generate_session_id};
pub use sse::{SseDecoder, SseFrame};
pub use stream::{StreamCallbacks, StreamHandle, StreamTransport, observe};
pub use types::*;
pub use validation::validate_requirement;
