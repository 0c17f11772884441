pub mod api;
pub mod config;
pub mod docpipe;
pub mod errors;
pub mod pipeline;
pub mod render;
