//! Shared fixtures for integration tests: a temp-file database and
//! deterministic fakes for the external collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use callscribe_en::db::init_database_pool;
use callscribe_en::models::{SentimentLabel, TranscriptSegment};
use callscribe_en::pipeline::{Orchestrator, RecordingProcessor};
use callscribe_en::services::artifacts::ArtifactStore;
use callscribe_en::services::enrichment::{CallSummary, Summarizer};
use callscribe_en::services::stt::{SpeechToText, SttTranscription};
use callscribe_en::services::telephony::{RecordingDetails, RecordingRef, RecordingsApi};
use callscribe_en::services::ServiceError;

pub const SAMPLE_VTT: &str = "WEBVTT\n\n\
    00:00:01.000 --> 00:00:04.000\n\
    Hello, thanks for calling support.\n\n\
    00:00:04.500 --> 00:00:08.000\n\
    I have a question about my invoice.\n";

pub fn call_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
}

/// Temp-backed database and artifact folder for one test
pub struct TestEnv {
    pub temp: TempDir,
    pub pool: SqlitePool,
}

pub async fn test_env() -> TestEnv {
    let temp = TempDir::new().expect("create temp dir");
    let pool = init_database_pool(&temp.path().join("test.db"))
        .await
        .expect("init database");
    TestEnv { temp, pool }
}

impl TestEnv {
    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(self.temp.path())
    }
}

/// Scripted platform API double with per-method call counters
#[derive(Default)]
pub struct FakeRecordingsApi {
    pub refs: Vec<RecordingRef>,
    pub details: HashMap<String, RecordingDetails>,
    pub details_errors: HashMap<String, ServiceError>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// url -> audio bytes
    pub audio: HashMap<String, Vec<u8>>,
    /// url -> caption text (mutable so tests can model upstream recovery)
    pub transcripts: Mutex<HashMap<String, String>>,
    pub list_calls: AtomicUsize,
    pub details_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub audio_calls: AtomicUsize,
    pub transcript_calls: AtomicUsize,
}

impl FakeRecordingsApi {
    pub fn with_recording(mut self, id: &str, details: RecordingDetails) -> Self {
        self.refs.push(RecordingRef {
            id: id.to_string(),
            create_time: Some(call_time()),
            topic: None,
            service_type: Some("callqueue".to_string()),
            duration_seconds: Some(120.0),
        });
        self.details.insert(id.to_string(), details);
        self
    }

    pub fn with_details_error(mut self, id: &str, error: ServiceError) -> Self {
        self.refs.push(RecordingRef {
            id: id.to_string(),
            create_time: Some(call_time()),
            topic: None,
            service_type: Some("callqueue".to_string()),
            duration_seconds: None,
        });
        self.details_errors.insert(id.to_string(), error);
        self
    }

    pub fn with_audio(mut self, url: &str, bytes: &[u8]) -> Self {
        self.audio.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn with_transcript(self, url: &str, vtt: &str) -> Self {
        self.transcripts
            .lock()
            .unwrap()
            .insert(url.to_string(), vtt.to_string());
        self
    }

    pub fn with_metadata(mut self, id: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(id.to_string(), value);
        self
    }
}

#[async_trait]
impl RecordingsApi for FakeRecordingsApi {
    async fn list_recordings(
        &self,
        _service_type: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        _max_results: usize,
    ) -> Result<Vec<RecordingRef>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.refs.clone())
    }

    async fn recording_details(
        &self,
        recording_id: &str,
    ) -> Result<RecordingDetails, ServiceError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.details_errors.get(recording_id) {
            return Err(err.clone());
        }
        self.details
            .get(recording_id)
            .cloned()
            .ok_or(ServiceError::NotAvailable)
    }

    async fn recording_metadata(
        &self,
        recording_id: &str,
    ) -> Result<Option<serde_json::Value>, ServiceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.get(recording_id).cloned())
    }

    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ServiceError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = self.audio.get(url).ok_or(ServiceError::NotAvailable)?;
        write_artifact(dest, bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn download_transcript(&self, url: &str, dest: &Path) -> Result<u64, ServiceError> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .transcripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(ServiceError::NotAvailable)?;
        write_artifact(dest, content.as_bytes()).await?;
        Ok(content.len() as u64)
    }
}

async fn write_artifact(dest: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;
    }
    tokio::fs::write(dest, bytes)
        .await
        .map_err(|e| ServiceError::Io(e.to_string()))
}

/// Scripted STT double
pub struct FakeStt {
    pub text: String,
    pub language: Option<String>,
    pub error: Option<ServiceError>,
    pub calls: AtomicUsize,
}

impl FakeStt {
    pub fn returning(text: &str, language: &str) -> Self {
        Self {
            text: text.to_string(),
            language: Some(language.to_string()),
            error: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, _audio_path: &Path) -> Result<SttTranscription, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(SttTranscription {
            text: self.text.clone(),
            language: self.language.clone(),
            duration_seconds: Some(42.0),
            segments: vec![TranscriptSegment {
                start: 0.0,
                end: 42.0,
                text: self.text.clone(),
            }],
        })
    }
}

/// Scripted summarizer double
pub struct FakeSummarizer {
    pub error: Option<ServiceError>,
    pub calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn ok() -> Self {
        Self {
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _transcript: &str) -> Result<CallSummary, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(CallSummary {
            summary: "Customer asked about an invoice; agent resolved it.".to_string(),
            bullets: vec!["invoice question".to_string()],
            topics: BTreeSet::from(["billing".to_string()]),
            action_items: vec![],
            sentiment_score: 0.3,
            sentiment_label: SentimentLabel::Positive,
        })
    }
}

/// Recording details with the given artifact links
pub fn details_with(audio_url: Option<&str>, transcript_url: Option<&str>) -> RecordingDetails {
    RecordingDetails {
        topic: Some("Support call".to_string()),
        create_time: Some(call_time()),
        duration_seconds: Some(120.0),
        participants: vec![],
        provider_type: Some("Webex".to_string()),
        audio_download_url: audio_url.map(str::to_string),
        transcript_download_url: transcript_url.map(str::to_string),
    }
}

pub fn make_processor(
    env: &TestEnv,
    api: Arc<FakeRecordingsApi>,
    stt: Option<Arc<FakeStt>>,
    summarizer: Option<Arc<FakeSummarizer>>,
) -> RecordingProcessor {
    use callscribe_en::services::transcripts::TranscriptResolver;

    let stt = stt.map(|s| s as Arc<dyn SpeechToText>);
    let summarizer = summarizer.map(|s| s as Arc<dyn Summarizer>);
    RecordingProcessor::new(
        env.pool.clone(),
        api as Arc<dyn RecordingsApi>,
        TranscriptResolver::new(stt),
        summarizer,
        env.artifacts(),
    )
}

pub fn make_orchestrator(
    env: &TestEnv,
    api: Arc<FakeRecordingsApi>,
    stt: Option<Arc<FakeStt>>,
    summarizer: Option<Arc<FakeSummarizer>>,
    worker_permits: usize,
) -> Orchestrator {
    let processor = make_processor(env, Arc::clone(&api), stt, summarizer);
    Orchestrator::new(
        env.pool.clone(),
        processor,
        api as Arc<dyn RecordingsApi>,
        worker_permits,
    )
}
