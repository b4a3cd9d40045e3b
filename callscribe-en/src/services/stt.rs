//! Fallback speech-to-text client
//!
//! Invoked only when the platform supplies no caption artifact but audio
//! was downloaded. Posts the audio to a Whisper-style transcription API
//! with automatic language detection and verbose (segment-level) output.

use super::ServiceError;
use crate::models::TranscriptSegment;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const STT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MODEL: &str = "whisper-1";

/// Transcription result from the fallback service
#[derive(Debug, Clone)]
pub struct SttTranscription {
    pub text: String,
    /// ISO-639-1 code detected by the service
    pub language: Option<String>,
    /// Audio duration reported by the service, seconds
    pub duration_seconds: Option<f64>,
    pub segments: Vec<TranscriptSegment>,
}

/// External speech-to-text capability
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<SttTranscription, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct SttWireResponse {
    text: String,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<SttWireSegment>,
}

#[derive(Debug, Deserialize)]
struct SttWireSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Production Whisper-style client
pub struct WhisperSttClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperSttClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: Option<String>,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(STT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperSttClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<SttTranscription, ServiceError> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| ServiceError::Io(format!("read {}: {}", audio_path.display(), e)))?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        tracing::info!(
            path = %audio_path.display(),
            bytes = bytes.len(),
            model = %self.model,
            "Transcribing audio via fallback STT"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("model", self.model.clone())
            // Segment-level output with detected language
            .text("response_format", "verbose_json");

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ServiceError::AuthExpired,
                429 => ServiceError::QuotaExceeded(format!("stt returned 429: {}", body)),
                s => ServiceError::UpstreamUnavailable(format!("stt returned {}: {}", s, body)),
            });
        }

        let wire: SttWireResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        let segments = wire
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
            })
            .collect::<Vec<_>>();

        tracing::info!(
            chars = wire.text.len(),
            language = wire.language.as_deref().unwrap_or("unknown"),
            segments = segments.len(),
            "Fallback transcription succeeded"
        );

        Ok(SttTranscription {
            text: wire.text,
            language: wire.language,
            duration_seconds: wire.duration,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults_model() {
        let client = WhisperSttClient::new("https://api.example.com/v1", "key", None).unwrap();
        assert_eq!(client.model, "whisper-1");
    }

    #[test]
    fn verbose_wire_format_parses() {
        let raw = serde_json::json!({
            "text": "hello world",
            "language": "en",
            "duration": 2.5,
            "segments": [
                {"id": 0, "start": 0.0, "end": 1.2, "text": " hello"},
                {"id": 1, "start": 1.2, "end": 2.5, "text": " world"}
            ]
        });

        let parsed: SttWireResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.text, "hello world");
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[1].end, 2.5);
    }
}
