//! Per-recording step ladder execution
//!
//! Runs the six steps in order against one recording, persisting after
//! every step so a crash mid-run loses at most the step in flight. Step
//! failures are recorded and the ladder keeps going; only a details
//! failure ends the recording, and only auth/quota errors escape to the
//! caller (they abort the whole batch, not just this recording).

use callscribe_common::Result as CommonResult;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::steps::{Step, TOTAL_STEPS};
use crate::db::recordings::upsert_recording;
use crate::models::{ProcessingOutcome, ProcessingStatus, Recording, TranscriptSource};
use crate::services::artifacts::ArtifactStore;
use crate::services::enrichment::{detect_language, Summarizer};
use crate::services::retry::retry_backoff;
use crate::services::telephony::{RecordingDetails, RecordingsApi};
use crate::services::transcripts::{TranscriptResolution, TranscriptResolver};
use crate::services::ServiceError;

const UPSTREAM_ATTEMPTS: u32 = 3;

/// Executes the step ladder for one recording at a time
pub struct RecordingProcessor {
    pool: SqlitePool,
    recordings_api: Arc<dyn RecordingsApi>,
    resolver: TranscriptResolver,
    summarizer: Option<Arc<dyn Summarizer>>,
    artifacts: ArtifactStore,
}

/// Bookkeeping for one run, separate from the durable recording state
struct RunState {
    /// Step name -> reason, for steps not attempted this run
    skipped: BTreeMap<String, String>,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl RecordingProcessor {
    pub fn new(
        pool: SqlitePool,
        recordings_api: Arc<dyn RecordingsApi>,
        resolver: TranscriptResolver,
        summarizer: Option<Arc<dyn Summarizer>>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            pool,
            recordings_api,
            resolver,
            summarizer,
            artifacts,
        }
    }

    /// Run the ladder over `recording`, returning the run outcome.
    ///
    /// `force` clears prior step bookkeeping and re-executes everything,
    /// overwriting stored enrichment. Without it, previously completed
    /// steps are not re-executed.
    ///
    /// `Err` is returned only for batch-fatal conditions (auth expired,
    /// quota exceeded); progress made before the abort is persisted.
    pub async fn process(
        &self,
        mut recording: Recording,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome, ServiceError> {
        let recording_id = recording.recording_id.clone();
        let mut run = RunState {
            skipped: BTreeMap::new(),
            started_at: Utc::now(),
        };

        if force {
            recording.steps_completed.clear();
            recording.step_errors.clear();
        } else if pending_steps(&recording).is_empty() {
            // Everything applicable already done: no network calls, no
            // writes, just report the stored state.
            tracing::debug!(recording_id, "All applicable steps already completed");
            return Ok(ProcessingOutcome {
                recording_id,
                status: recording.status,
                quality_score: recording.quality_score,
                applicable_steps: applicable_steps(&recording),
                steps_completed: recording.steps_completed.iter().cloned().collect(),
                steps_skipped: run.skipped,
                step_errors: recording.step_errors.clone(),
                started_at: run.started_at,
                finished_at: Utc::now(),
            });
        }

        recording.processing_started_at = Some(run.started_at);
        recording.processing_completed_at = None;
        recording.step_errors.clear();
        // A fresh run owns the verdict; a prior failure must not stick
        // once the steps start passing.
        recording.status = ProcessingStatus::New;
        self.persist(&recording).await?;

        tracing::info!(recording_id, force, "Processing recording");

        // fetch_details gates everything downstream: it carries the
        // artifact links the later steps consume. Once completed it is
        // not re-executed without force; a resumed run works from the
        // stored references and local artifacts instead.
        let details = if !force && recording.steps_completed.contains(Step::FetchDetails.name()) {
            tracing::debug!(recording_id, "Details already fetched, resuming from stored state");
            stored_details(&recording)
        } else {
            match self.fetch_details(&mut recording).await {
                Ok(details) => details,
                Err(e) if e.is_batch_fatal() => {
                    self.persist(&recording).await?;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(recording_id, error = %e, "Details unavailable, recording failed");
                    // A failed step never counts as completed, and a
                    // details failure zeroes the score.
                    recording.steps_completed.clear();
                    recording
                        .step_errors
                        .insert(Step::FetchDetails.name().to_string(), e.to_string());
                    recording.status = ProcessingStatus::Failed;
                    for step in &Step::ALL[1..] {
                        run.skipped
                            .insert(step.name().to_string(), "details unavailable".to_string());
                    }
                    return Ok(self.settle(&mut recording, run).await?);
                }
            }
        };
        self.persist(&recording).await?;

        for step in [
            Step::FetchMetadata,
            Step::DownloadAudio,
            Step::ResolveTranscript,
            Step::Summarize,
            Step::DetectLanguage,
        ] {
            if cancel.is_cancelled() {
                tracing::info!(recording_id, step = step.name(), "Run cancelled before step");
                if !recording.steps_completed.contains(step.name()) {
                    run.skipped
                        .insert(step.name().to_string(), "cancelled".to_string());
                }
                continue;
            }

            if step.requires_transcript() && !recording.has_transcript() {
                run.skipped
                    .insert(step.name().to_string(), "no transcript".to_string());
                continue;
            }

            if recording.steps_completed.contains(step.name()) {
                tracing::debug!(recording_id, step = step.name(), "Step already completed");
                continue;
            }

            let result = match step {
                Step::FetchDetails => unreachable!("details handled above the loop"),
                Step::FetchMetadata => self.fetch_metadata(&mut recording).await,
                Step::DownloadAudio => self.download_audio(&mut recording, &details, force).await,
                Step::ResolveTranscript => {
                    self.resolve_transcript(&mut recording, &details, force)
                        .await
                }
                Step::Summarize => self.summarize(&mut recording).await,
                Step::DetectLanguage => self.detect_language(&mut recording).await,
            };

            match result {
                Ok(StepResult::Completed) => {
                    recording.steps_completed.insert(step.name().to_string());
                    recording.step_errors.remove(step.name());
                }
                Ok(StepResult::Skipped(reason)) => {
                    tracing::debug!(recording_id, step = step.name(), reason, "Step skipped");
                    run.skipped.insert(step.name().to_string(), reason);
                }
                Err(e) if e.is_batch_fatal() => {
                    recording
                        .step_errors
                        .insert(step.name().to_string(), e.to_string());
                    self.settle(&mut recording, run).await?;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(recording_id, step = step.name(), error = %e, "Step failed");
                    recording
                        .step_errors
                        .insert(step.name().to_string(), e.to_string());
                }
            }

            self.persist(&recording).await?;
        }

        Ok(self.settle(&mut recording, run).await?)
    }

    /// Compute final status and score, persist, and build the outcome
    async fn settle(
        &self,
        recording: &mut Recording,
        run: RunState,
    ) -> Result<ProcessingOutcome, ServiceError> {
        let finished_at = Utc::now();
        let applicable = applicable_steps(recording);

        recording.quality_score =
            recording.steps_completed.len() as f64 / TOTAL_STEPS as f64;
        if recording.status != ProcessingStatus::Failed {
            let all_done = Step::ALL
                .iter()
                .filter(|s| !(s.requires_transcript() && !recording.has_transcript()))
                .all(|s| recording.steps_completed.contains(s.name()));
            recording.status = if all_done {
                ProcessingStatus::Completed
            } else {
                ProcessingStatus::Partial
            };
        }
        recording.processing_completed_at = Some(finished_at);
        recording.processing_duration_seconds = recording
            .processing_started_at
            .map(|s| (finished_at - s).num_milliseconds() as f64 / 1000.0);

        self.persist(recording).await?;

        tracing::info!(
            recording_id = %recording.recording_id,
            status = recording.status.as_str(),
            quality = recording.quality_score,
            steps = recording.steps_completed.len(),
            "Recording settled"
        );

        Ok(ProcessingOutcome {
            recording_id: recording.recording_id.clone(),
            status: recording.status,
            quality_score: recording.quality_score,
            applicable_steps: applicable,
            steps_completed: recording.steps_completed.iter().cloned().collect(),
            steps_skipped: run.skipped,
            step_errors: recording.step_errors.clone(),
            started_at: run.started_at,
            finished_at,
        })
    }

    async fn persist(&self, recording: &Recording) -> Result<(), ServiceError> {
        store_write(upsert_recording(&self.pool, recording).await)
    }

    async fn fetch_details(
        &self,
        recording: &mut Recording,
    ) -> Result<RecordingDetails, ServiceError> {
        let api = self.recordings_api.as_ref();
        let id = recording.recording_id.clone();
        let details = retry_backoff("fetch_details", UPSTREAM_ATTEMPTS, || {
            api.recording_details(&id)
        })
        .await?;

        if let Some(create_time) = details.create_time {
            recording.timestamp = create_time;
        }
        if details.duration_seconds.is_some() {
            recording.duration_seconds = details.duration_seconds;
        }
        if details.provider_type.is_some() {
            recording.provider_type = details.provider_type.clone();
        }
        if let Some(first) = details.participants.first() {
            recording.caller = first.email.clone();
            recording.caller_name = first.name.clone();
        }
        if let Some(second) = details.participants.get(1) {
            recording.callee = second.email.clone();
            recording.callee_name = second.name.clone();
        }
        if !details.participants.is_empty() {
            recording.participants = serde_json::to_value(&details.participants).ok();
        }
        recording.audio_remote_ref = details.audio_download_url.clone();

        recording
            .steps_completed
            .insert(Step::FetchDetails.name().to_string());
        Ok(details)
    }

    async fn fetch_metadata(&self, recording: &mut Recording) -> Result<StepResult, ServiceError> {
        let api = self.recordings_api.as_ref();
        let id = recording.recording_id.clone();
        let metadata = retry_backoff("fetch_metadata", UPSTREAM_ATTEMPTS, || {
            api.recording_metadata(&id)
        })
        .await?;

        // Absence of extended metadata is a normal outcome for the step.
        if let Some(value) = metadata {
            recording.platform_metadata = Some(value);
        }
        Ok(StepResult::Completed)
    }

    async fn download_audio(
        &self,
        recording: &mut Recording,
        details: &RecordingDetails,
        force: bool,
    ) -> Result<StepResult, ServiceError> {
        let Some(url) = &details.audio_download_url else {
            return Ok(StepResult::Skipped(
                "no audio artifact published".to_string(),
            ));
        };

        let dest = self
            .artifacts
            .audio_path(&recording.recording_id, recording.timestamp);

        if !force && dest.exists() {
            let size = tokio::fs::metadata(&dest)
                .await
                .map(|m| m.len() as i64)
                .unwrap_or(0);
            tracing::debug!(
                recording_id = %recording.recording_id,
                path = %dest.display(),
                "Reusing previously downloaded audio"
            );
            set_audio_fields(recording, &dest, size);
            return Ok(StepResult::Completed);
        }

        ArtifactStore::ensure_parent(&dest)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;

        let api = self.recordings_api.as_ref();
        let bytes = match retry_backoff("download_audio", UPSTREAM_ATTEMPTS, || {
            api.download_audio(url, &dest)
        })
        .await
        {
            Ok(bytes) => bytes,
            Err(ServiceError::NotAvailable) => {
                return Ok(StepResult::Skipped("audio artifact not available".to_string()));
            }
            Err(e) => return Err(e),
        };

        set_audio_fields(recording, &dest, bytes as i64);
        Ok(StepResult::Completed)
    }

    async fn resolve_transcript(
        &self,
        recording: &mut Recording,
        details: &RecordingDetails,
        force: bool,
    ) -> Result<StepResult, ServiceError> {
        let caption_dest = self
            .artifacts
            .transcript_path(&recording.recording_id, recording.timestamp);
        let audio_path = recording.audio_local_path.clone().map(std::path::PathBuf::from);

        let resolution = match self
            .resolver
            .resolve(
                self.recordings_api.as_ref(),
                details,
                &recording.recording_id,
                &caption_dest,
                audio_path.as_deref(),
                force,
            )
            .await
        {
            Ok(resolution) => resolution,
            Err(ServiceError::NotAvailable) => {
                return Ok(StepResult::Skipped(
                    "caption artifact not available".to_string(),
                ));
            }
            Err(ServiceError::NotConfigured(what)) => {
                return Ok(StepResult::Skipped(format!("{} not configured", what)));
            }
            Err(e) => return Err(e),
        };

        match resolution {
            TranscriptResolution::Resolved {
                text,
                segments,
                source,
                language,
                audio_duration_seconds,
            } => {
                recording.transcript_text = Some(text);
                recording.transcript_segments = segments;
                recording.transcript_source = source;
                if language.is_some() {
                    recording.detected_language = language;
                    // The STT service asserts the language; the heuristic
                    // confidence scale doesn't apply.
                    recording.language_confidence = Some(1.0);
                }
                if audio_duration_seconds.is_some() {
                    recording.audio_duration_seconds = audio_duration_seconds;
                }
                Ok(StepResult::Completed)
            }
            TranscriptResolution::Unresolved => {
                recording.transcript_source = TranscriptSource::None;
                Ok(StepResult::Skipped(
                    "no caption artifact or audio".to_string(),
                ))
            }
        }
    }

    async fn summarize(&self, recording: &mut Recording) -> Result<StepResult, ServiceError> {
        let Some(summarizer) = &self.summarizer else {
            return Ok(StepResult::Skipped("summarizer not configured".to_string()));
        };
        let transcript = recording
            .transcript_text
            .clone()
            .unwrap_or_default();

        let summary = retry_backoff("summarize", UPSTREAM_ATTEMPTS, || {
            summarizer.summarize(&transcript)
        })
        .await?;

        recording.summary_text = Some(summary.summary);
        recording.summary_bullets = summary.bullets;
        recording.key_topics = summary.topics;
        recording.action_items = summary.action_items;
        recording.sentiment_score = Some(summary.sentiment_score);
        recording.sentiment_label = Some(summary.sentiment_label);
        Ok(StepResult::Completed)
    }

    async fn detect_language(&self, recording: &mut Recording) -> Result<StepResult, ServiceError> {
        // The fallback STT already asserts a language; keep it.
        if recording.detected_language.is_none() {
            let text = recording.transcript_text.as_deref().unwrap_or_default();
            let guess = detect_language(text);
            recording.detected_language = Some(guess.code);
            recording.language_confidence = Some(guess.confidence);
        }
        Ok(StepResult::Completed)
    }
}

/// Outcome of one step attempt
enum StepResult {
    Completed,
    /// Not attempted or nothing to do; reason shown in the run outcome
    Skipped(String),
}

fn set_audio_fields(recording: &mut Recording, dest: &Path, size_bytes: i64) {
    recording.audio_local_path = Some(dest.display().to_string());
    recording.audio_size_bytes = Some(size_bytes);
    recording.audio_format = dest
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .or_else(|| Some("mp3".to_string()));
}

/// Call facts rebuilt from the stored row, for runs resuming past a
/// previously completed details step. The remote links may have expired
/// upstream; the later steps prefer local artifacts anyway.
fn stored_details(recording: &Recording) -> RecordingDetails {
    RecordingDetails {
        topic: None,
        create_time: Some(recording.timestamp),
        duration_seconds: recording.duration_seconds,
        participants: Vec::new(),
        provider_type: recording.provider_type.clone(),
        audio_download_url: recording.audio_remote_ref.clone(),
        transcript_download_url: None,
    }
}

/// Steps whose prerequisites exist for this recording
fn applicable_steps(recording: &Recording) -> usize {
    if recording.has_transcript() {
        TOTAL_STEPS
    } else {
        TOTAL_STEPS - 2
    }
}

/// Applicable steps not yet completed
fn pending_steps(recording: &Recording) -> Vec<Step> {
    Step::ALL
        .iter()
        .copied()
        .filter(|s| !(s.requires_transcript() && !recording.has_transcript()))
        .filter(|s| !recording.steps_completed.contains(s.name()))
        .collect()
}

fn store_write(result: CommonResult<()>) -> Result<(), ServiceError> {
    result.map_err(|e| ServiceError::Io(format!("store write failed: {}", e)))
}
