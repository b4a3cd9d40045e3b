//! Recording entity and its enums
//!
//! One row per platform-assigned `recording_id`. The record accumulates
//! artifacts as pipeline steps complete; every field below the call facts
//! is nullable because any step may fail or be skipped without aborting
//! the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Terminal (and initial) processing states for a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Discovered, no pipeline run finished yet
    New,
    /// Every applicable step completed
    Completed,
    /// At least one applicable step failed or was skipped
    Partial,
    /// fetch_details failed; nothing else was attempted
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::New => "new",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Partial => "partial",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ProcessingStatus::New),
            "completed" => Some(ProcessingStatus::Completed),
            "partial" => Some(ProcessingStatus::Partial),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// Where the transcript text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Caption artifact supplied by the telephony platform
    Platform,
    /// External speech-to-text over the downloaded audio
    FallbackStt,
    /// No transcript obtained
    None,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Platform => "platform",
            TranscriptSource::FallbackStt => "fallback_stt",
            TranscriptSource::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "platform" => TranscriptSource::Platform,
            "fallback_stt" => TranscriptSource::FallbackStt,
            _ => TranscriptSource::None,
        }
    }
}

/// Overall call sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

/// One timed transcript chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment start, seconds from recording start
    pub start: f64,
    /// Segment end, seconds from recording start
    pub end: f64,
    pub text: String,
}

/// One call's enrichment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Platform-assigned identifier, primary key for upsert
    pub recording_id: String,

    // Call facts
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
    pub caller: Option<String>,
    pub callee: Option<String>,
    pub caller_name: Option<String>,
    pub callee_name: Option<String>,
    pub service_type: Option<String>,
    pub provider_type: Option<String>,
    pub participants: Option<serde_json::Value>,
    /// Opaque platform metadata blob, preserved verbatim for audit
    pub platform_metadata: Option<serde_json::Value>,

    // Audio artifact
    pub audio_remote_ref: Option<String>,
    pub audio_local_path: Option<String>,
    pub audio_format: Option<String>,
    pub audio_size_bytes: Option<i64>,
    pub audio_duration_seconds: Option<f64>,

    // Transcript
    pub transcript_text: Option<String>,
    pub transcript_source: TranscriptSource,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub detected_language: Option<String>,
    pub language_confidence: Option<f64>,

    // Enrichment
    pub summary_text: Option<String>,
    pub summary_bullets: Vec<String>,
    pub key_topics: BTreeSet<String>,
    pub action_items: Vec<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,

    // Pipeline bookkeeping
    pub status: ProcessingStatus,
    /// Step names that executed successfully (ever, across runs)
    pub steps_completed: BTreeSet<String>,
    /// Step name -> error description for failed steps
    pub step_errors: BTreeMap<String, String>,
    /// Always `|steps_completed| / TOTAL_STEPS`; never renormalized for skips
    pub quality_score: f64,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub processing_duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    /// Create a freshly discovered recording
    pub fn new(recording_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            recording_id: recording_id.into(),
            timestamp,
            duration_seconds: None,
            caller: None,
            callee: None,
            caller_name: None,
            callee_name: None,
            service_type: None,
            provider_type: None,
            participants: None,
            platform_metadata: None,
            audio_remote_ref: None,
            audio_local_path: None,
            audio_format: None,
            audio_size_bytes: None,
            audio_duration_seconds: None,
            transcript_text: None,
            transcript_source: TranscriptSource::None,
            transcript_segments: Vec::new(),
            detected_language: None,
            language_confidence: None,
            summary_text: None,
            summary_bullets: Vec::new(),
            key_topics: BTreeSet::new(),
            action_items: Vec::new(),
            sentiment_score: None,
            sentiment_label: None,
            status: ProcessingStatus::New,
            steps_completed: BTreeSet::new(),
            step_errors: BTreeMap::new(),
            quality_score: 0.0,
            processing_started_at: None,
            processing_completed_at: None,
            processing_duration_seconds: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transcript present and non-empty
    pub fn has_transcript(&self) -> bool {
        self.transcript_text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_round_trip() {
        for status in [
            ProcessingStatus::New,
            ProcessingStatus::Completed,
            ProcessingStatus::Partial,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProcessingStatus::parse("bogus"), None);
    }

    #[test]
    fn new_recording_starts_empty() {
        let rec = Recording::new("rec-1", Utc::now());
        assert_eq!(rec.status, ProcessingStatus::New);
        assert_eq!(rec.transcript_source, TranscriptSource::None);
        assert!(rec.steps_completed.is_empty());
        assert_eq!(rec.quality_score, 0.0);
        assert!(!rec.has_transcript());
    }
}
