//! Structured results returned by pipeline entry points
//!
//! Callers always receive an outcome per recording; ordinary per-step
//! failures never surface as transport errors.

use crate::models::ProcessingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Outcome of one recording's pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub recording_id: String,
    pub status: ProcessingStatus,
    /// Completed-step count over the fixed total (6)
    pub quality_score: f64,
    /// Steps whose prerequisite data existed during this run
    pub applicable_steps: usize,
    /// All successfully executed steps (across runs), sorted
    pub steps_completed: Vec<String>,
    /// Step name -> skip reason, for this run only
    pub steps_skipped: BTreeMap<String, String>,
    /// Step name -> error description
    pub step_errors: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of one ingest batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: Uuid,
    /// Recording references returned by the platform for the window
    pub discovered: usize,
    /// References skipped because a row with that identifier already exists
    pub already_known: usize,
    pub outcomes: Vec<ProcessingOutcome>,
    /// Set when the batch stopped early (auth expired / quota exceeded)
    pub aborted: Option<String>,
}

impl IngestReport {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            discovered: 0,
            already_known: 0,
            outcomes: Vec::new(),
            aborted: None,
        }
    }
}
