//! External collaborators: telephony platform, speech-to-text, summarization
//!
//! Each client lives behind a trait so the pipeline can be exercised with
//! deterministic fakes. All of them speak the shared [`ServiceError`]
//! taxonomy; the pipeline decides per error kind whether a failure is a
//! step error, a clean skip, or a batch abort.

pub mod artifacts;
pub mod enrichment;
pub mod retry;
pub mod stt;
pub mod telephony;
pub mod transcripts;
pub mod vtt;

use thiserror::Error;

/// Failure taxonomy for external calls
///
/// Cloneable by design: errors are recorded into the recording's step
/// bookkeeping as plain descriptions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Bearer token rejected (401/403). Refresh is someone else's job;
    /// propagated up and aborts the current batch.
    #[error("authorization expired or rejected")]
    AuthExpired,

    /// Network failure or 5xx. Retried with bounded backoff at the call
    /// site; if retries exhaust, recorded as a step error.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The platform has no such artifact for this recording. Not an error:
    /// the step is skipped cleanly.
    #[error("artifact not available")]
    NotAvailable,

    /// Unparseable caption or service payload. Step error, non-fatal.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Rate limiter or billing limit hit (429). Aborts the current batch.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Local filesystem failure while persisting an artifact
    #[error("artifact io error: {0}")]
    Io(String),

    /// Collaborator not configured (no API key / endpoint)
    #[error("service not configured: {0}")]
    NotConfigured(String),
}

impl ServiceError {
    /// Errors that abort the whole ingest batch rather than one step
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::AuthExpired | ServiceError::QuotaExceeded(_)
        )
    }

    /// Errors worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::UpstreamUnavailable(_))
    }
}
