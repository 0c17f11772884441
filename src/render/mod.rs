pub mod progress;
pub mod report;

pub use progress::RunProgress;
