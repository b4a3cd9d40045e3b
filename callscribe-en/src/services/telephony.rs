//! Telephony recordings API client
//!
//! Thin adapter over the platform's converged-recordings endpoints with a
//! shared interval rate limiter. The platform allows one call per fixed
//! interval per account, so the limiter is process-wide and passed into
//! the client rather than being a module singleton.

use super::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_RATE_LIMIT_MS: u64 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// One entry from the platform's list endpoint
#[derive(Debug, Clone)]
pub struct RecordingRef {
    pub id: String,
    pub create_time: Option<DateTime<Utc>>,
    pub topic: Option<String>,
    pub service_type: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// A participant on the recorded call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Full call facts for one recording
#[derive(Debug, Clone, Default)]
pub struct RecordingDetails {
    pub topic: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub participants: Vec<Participant>,
    pub provider_type: Option<String>,
    /// Absent when the platform exposes no downloadable audio artifact
    pub audio_download_url: Option<String>,
    /// Absent when the platform produced no caption artifact
    pub transcript_download_url: Option<String>,
}

/// Access to the platform recordings API
#[async_trait]
pub trait RecordingsApi: Send + Sync {
    async fn list_recordings(
        &self,
        service_type: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<RecordingRef>, ServiceError>;

    async fn recording_details(&self, recording_id: &str)
        -> Result<RecordingDetails, ServiceError>;

    /// Best effort: `Ok(None)` when the platform has no extended metadata
    async fn recording_metadata(
        &self,
        recording_id: &str,
    ) -> Result<Option<serde_json::Value>, ServiceError>;

    /// Download an audio artifact to `dest`, returning the byte count
    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ServiceError>;

    /// Download a caption artifact to `dest`, returning the byte count
    async fn download_transcript(&self, url: &str, dest: &Path) -> Result<u64, ServiceError>;
}

/// Interval rate limiter shared by every platform call in the process
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the platform rate limit
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// Wire formats from the platform API.

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    id: String,
    create_time: Option<DateTime<Utc>>,
    topic: Option<String>,
    service_type: Option<String>,
    duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsResponse {
    topic: Option<String>,
    create_time: Option<DateTime<Utc>>,
    duration_seconds: Option<f64>,
    #[serde(default)]
    participants: Vec<Participant>,
    provider_type: Option<String>,
    download_url: Option<String>,
    #[serde(default)]
    temporary_direct_download_links: DownloadLinks,
    transcript_download_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadLinks {
    audio_download_link: Option<String>,
    transcript_download_link: Option<String>,
}

/// Production recordings client (reqwest + bearer token)
pub struct TelephonyClient {
    http_client: reqwest::Client,
    download_client: reqwest::Client,
    base_url: String,
    access_token: String,
    rate_limiter: Arc<RateLimiter>,
}

impl TelephonyClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        // Audio artifacts can be large; downloads get a wider timeout.
        let download_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            download_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            rate_limiter,
        })
    }

    /// Default limiter honoring the platform's documented one-call interval
    pub fn default_rate_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(DEFAULT_RATE_LIMIT_MS))
    }

    fn map_status(status: reqwest::StatusCode, body: &str) -> ServiceError {
        match status.as_u16() {
            401 | 403 => ServiceError::AuthExpired,
            404 => ServiceError::NotAvailable,
            429 => ServiceError::QuotaExceeded(format!("platform returned 429: {}", body)),
            s if s >= 500 => {
                ServiceError::UpstreamUnavailable(format!("platform returned {}: {}", s, body))
            }
            s => ServiceError::UpstreamUnavailable(format!("platform returned {}: {}", s, body)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, ServiceError> {
        self.rate_limiter.wait().await;

        let response = self
            .download_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::Io(e.to_string()))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;

        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl RecordingsApi for TelephonyClient {
    async fn list_recordings(
        &self,
        service_type: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<RecordingRef>, ServiceError> {
        let url = format!("{}/admin/convergedRecordings", self.base_url);
        let query = [
            ("serviceType", service_type.to_string()),
            ("from", from.to_rfc3339()),
            ("to", to.to_rfc3339()),
            // Platform caps page size at 1000
            ("max", max_results.min(1000).to_string()),
        ];

        tracing::debug!(service_type, from = %from, to = %to, "Listing platform recordings");

        let response: ListResponse = self.get_json(&url, &query).await?;

        let refs = response
            .items
            .into_iter()
            .map(|item| RecordingRef {
                id: item.id,
                create_time: item.create_time,
                topic: item.topic,
                service_type: item.service_type,
                duration_seconds: item.duration_seconds,
            })
            .collect::<Vec<_>>();

        tracing::info!(count = refs.len(), "Platform recordings listed");
        Ok(refs)
    }

    async fn recording_details(
        &self,
        recording_id: &str,
    ) -> Result<RecordingDetails, ServiceError> {
        // Detail endpoint has no /admin prefix, only the list does.
        let url = format!("{}/convergedRecordings/{}", self.base_url, recording_id);
        let response: DetailsResponse = self.get_json(&url, &[]).await?;

        let audio_download_url = response
            .download_url
            .or(response.temporary_direct_download_links.audio_download_link);
        let transcript_download_url = response.transcript_download_link.or(response
            .temporary_direct_download_links
            .transcript_download_link);

        tracing::debug!(
            recording_id,
            has_audio_link = audio_download_url.is_some(),
            has_transcript_link = transcript_download_url.is_some(),
            "Recording details retrieved"
        );

        Ok(RecordingDetails {
            topic: response.topic,
            create_time: response.create_time,
            duration_seconds: response.duration_seconds,
            participants: response.participants,
            provider_type: response.provider_type,
            audio_download_url,
            transcript_download_url,
        })
    }

    async fn recording_metadata(
        &self,
        recording_id: &str,
    ) -> Result<Option<serde_json::Value>, ServiceError> {
        let url = format!(
            "{}/convergedRecordings/{}/metadata",
            self.base_url, recording_id
        );

        match self.get_json::<serde_json::Value>(&url, &[]).await {
            Ok(value) => Ok(Some(value)),
            // Extended metadata is best-effort; its absence is not an error.
            Err(ServiceError::NotAvailable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn download_audio(&self, url: &str, dest: &Path) -> Result<u64, ServiceError> {
        let bytes = self.download(url, dest).await?;
        tracing::info!(dest = %dest.display(), bytes, "Audio artifact downloaded");
        Ok(bytes)
    }

    async fn download_transcript(&self, url: &str, dest: &Path) -> Result<u64, ServiceError> {
        let bytes = self.download(url, dest).await?;
        tracing::info!(dest = %dest.display(), bytes, "Caption artifact downloaded");
        Ok(bytes)
    }
}
