//! Transcript resolution strategies
//!
//! Two strategies in fixed priority order: the platform's own caption
//! artifact, then fallback speech-to-text over the downloaded audio. The
//! orchestrator only sees the resolution outcome; it never branches on
//! which strategy applied.

use super::stt::SpeechToText;
use super::telephony::{RecordingDetails, RecordingsApi};
use super::{retry::retry_backoff, vtt, ServiceError};
use crate::models::{TranscriptSegment, TranscriptSource};
use std::path::Path;
use std::sync::Arc;

const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Result of transcript resolution for one recording
#[derive(Debug, Clone)]
pub enum TranscriptResolution {
    Resolved {
        text: String,
        segments: Vec<TranscriptSegment>,
        source: TranscriptSource,
        /// Language detected by the fallback STT service, when it ran
        language: Option<String>,
        /// Audio duration reported by the fallback STT service
        audio_duration_seconds: Option<f64>,
    },
    /// No caption artifact and no eligible audio. An expected terminal
    /// state for the step, not an error.
    Unresolved,
}

pub struct TranscriptResolver {
    stt: Option<Arc<dyn SpeechToText>>,
}

impl TranscriptResolver {
    pub fn new(stt: Option<Arc<dyn SpeechToText>>) -> Self {
        Self { stt }
    }

    /// Resolve a transcript for one recording.
    ///
    /// `caption_dest` is the date-partitioned path the caption artifact is
    /// stored at; when it already exists and `force` is false the local
    /// copy is parsed without re-downloading.
    pub async fn resolve(
        &self,
        recordings: &dyn RecordingsApi,
        details: &RecordingDetails,
        recording_id: &str,
        caption_dest: &Path,
        audio_local_path: Option<&Path>,
        force: bool,
    ) -> Result<TranscriptResolution, ServiceError> {
        // Strategy 1: platform caption artifact, either freshly linked or
        // already held locally from an earlier run
        let local_copy = !force && caption_dest.exists();
        if local_copy {
            tracing::debug!(
                recording_id,
                path = %caption_dest.display(),
                "Reusing previously downloaded caption artifact"
            );
        } else if let Some(url) = &details.transcript_download_url {
            retry_backoff("download_transcript", DOWNLOAD_ATTEMPTS, || {
                recordings.download_transcript(url, caption_dest)
            })
            .await?;
        }
        if local_copy || details.transcript_download_url.is_some() {
            let content = tokio::fs::read_to_string(caption_dest)
                .await
                .map_err(|e| ServiceError::Io(e.to_string()))?;
            let parsed = vtt::parse_vtt(&content)
                .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

            tracing::info!(
                recording_id,
                chars = parsed.text.len(),
                segments = parsed.segments.len(),
                "Transcript resolved from platform captions"
            );

            return Ok(TranscriptResolution::Resolved {
                text: parsed.text,
                segments: parsed.segments,
                source: TranscriptSource::Platform,
                language: None,
                audio_duration_seconds: None,
            });
        }

        // Strategy 2: fallback STT over local audio
        if let Some(audio_path) = audio_local_path.filter(|p| p.exists()) {
            let stt = self.stt.as_ref().ok_or_else(|| {
                ServiceError::NotConfigured("fallback speech-to-text".to_string())
            })?;

            let transcription = stt.transcribe(audio_path).await?;

            tracing::info!(
                recording_id,
                chars = transcription.text.len(),
                language = transcription.language.as_deref().unwrap_or("unknown"),
                "Transcript resolved via fallback STT"
            );

            return Ok(TranscriptResolution::Resolved {
                text: transcription.text,
                segments: transcription.segments,
                source: TranscriptSource::FallbackStt,
                language: transcription.language,
                audio_duration_seconds: transcription.duration_seconds,
            });
        }

        tracing::debug!(recording_id, "No caption artifact and no local audio");
        Ok(TranscriptResolution::Unresolved)
    }
}
