//! Data model for the enrichment service

pub mod outcome;
pub mod recording;

pub use outcome::{IngestReport, ProcessingOutcome};
pub use recording::{
    ProcessingStatus, Recording, SentimentLabel, TranscriptSegment, TranscriptSource,
};
