//! Enrichment pipeline: the step ladder and its batch orchestration

pub mod orchestrator;
pub mod processor;
pub mod steps;

pub use orchestrator::{IngestWindow, Orchestrator};
pub use processor::RecordingProcessor;
pub use steps::{Step, TOTAL_STEPS};
