//! Batch orchestration
//!
//! Discovers recordings from the platform, fans the new ones out over a
//! bounded worker pool, and serializes concurrent runs against the same
//! recording with per-identifier locks. Auth and quota failures abort the
//! whole batch; every other failure stays contained to its recording.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::processor::RecordingProcessor;
use crate::db::recordings::{get_recording, recording_exists};
use crate::models::{IngestReport, ProcessingOutcome, Recording};
use crate::services::retry::retry_backoff;
use crate::services::telephony::RecordingsApi;
use crate::services::ServiceError;

const LIST_ATTEMPTS: u32 = 3;

/// Parameters for one ingest batch
#[derive(Debug, Clone)]
pub struct IngestWindow {
    pub service_type: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub max_results: usize,
}

pub struct Orchestrator {
    pool: SqlitePool,
    processor: Arc<RecordingProcessor>,
    recordings_api: Arc<dyn RecordingsApi>,
    permits: Arc<Semaphore>,
    /// Per-recording locks so one identifier is never processed twice at
    /// once. Entries are few and never pruned.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        pool: SqlitePool,
        processor: RecordingProcessor,
        recordings_api: Arc<dyn RecordingsApi>,
        worker_permits: usize,
    ) -> Self {
        Self {
            pool,
            processor: Arc::new(processor),
            recordings_api,
            permits: Arc::new(Semaphore::new(worker_permits.max(1))),
            locks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Signal in-flight runs to stop at their next step boundary
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn lock_for(&self, recording_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(recording_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Discover recordings in the window and process the unknown ones.
    ///
    /// Already-stored identifiers are counted and skipped; they are only
    /// re-run through explicit reprocessing. Returns `Err` only when
    /// discovery itself fails; batch-fatal errors inside workers stop the
    /// remaining work and are reported via [`IngestReport::aborted`].
    pub async fn ingest_new(&self, window: IngestWindow) -> Result<IngestReport, ServiceError> {
        let batch_id = Uuid::new_v4();
        let mut report = IngestReport::new(batch_id);

        tracing::info!(
            %batch_id,
            service_type = %window.service_type,
            from = %window.from,
            to = %window.to,
            "Starting ingest batch"
        );

        let api = self.recordings_api.as_ref();
        let refs = retry_backoff("list_recordings", LIST_ATTEMPTS, || {
            api.list_recordings(
                &window.service_type,
                window.from,
                window.to,
                window.max_results,
            )
        })
        .await?;
        report.discovered = refs.len();

        let batch_cancel = self.shutdown.child_token();
        let mut workers = JoinSet::new();

        for reference in refs {
            if recording_exists(&self.pool, &reference.id)
                .await
                .map_err(|e| ServiceError::Io(format!("store read failed: {}", e)))?
            {
                report.already_known += 1;
                continue;
            }

            let mut recording = Recording::new(&reference.id, reference.create_time.unwrap_or_else(Utc::now));
            recording.service_type = reference
                .service_type
                .clone()
                .or_else(|| Some(window.service_type.clone()));
            recording.duration_seconds = reference.duration_seconds;

            let processor = Arc::clone(&self.processor);
            let permits = Arc::clone(&self.permits);
            let lock = self.lock_for(&reference.id).await;
            let cancel = batch_cancel.clone();
            let pool = self.pool.clone();

            workers.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                let _guard = lock.lock().await;
                if cancel.is_cancelled() {
                    return None;
                }
                // An overlapping batch can store this identifier between
                // the existence check and here; resume from its
                // bookkeeping instead of a blank row.
                let reloaded = get_recording(&pool, &recording.recording_id).await;
                let recording = match reloaded {
                    Ok(Some(stored)) => stored,
                    Ok(None) => recording,
                    Err(e) => {
                        return Some(Err(ServiceError::Io(format!("store read failed: {}", e))))
                    }
                };
                Some(processor.process(recording, false, &cancel).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(Ok(outcome))) => report.outcomes.push(outcome),
                Ok(Some(Err(e))) => {
                    // Auth or quota is gone for every remaining worker too.
                    tracing::error!(%batch_id, error = %e, "Batch-fatal error, aborting batch");
                    if report.aborted.is_none() {
                        report.aborted = Some(e.to_string());
                    }
                    batch_cancel.cancel();
                }
                Ok(None) => {}
                Err(join_err) => {
                    tracing::error!(%batch_id, error = %join_err, "Worker task panicked");
                    if report.aborted.is_none() {
                        report.aborted = Some(format!("worker panicked: {}", join_err));
                    }
                }
            }
        }

        tracing::info!(
            %batch_id,
            discovered = report.discovered,
            already_known = report.already_known,
            processed = report.outcomes.len(),
            aborted = report.aborted.is_some(),
            "Ingest batch finished"
        );

        Ok(report)
    }

    /// Re-run the ladder for one stored recording.
    ///
    /// With `force` the prior bookkeeping is discarded and every step
    /// re-executes; without it only incomplete steps run. `Ok(None)` when
    /// the identifier is unknown.
    pub async fn reprocess(
        &self,
        recording_id: &str,
        force: bool,
    ) -> Result<Option<ProcessingOutcome>, ServiceError> {
        let lock = self.lock_for(recording_id).await;
        let _guard = lock.lock().await;

        // Load under the lock so a racing run's writes are visible.
        let Some(recording) = get_recording(&self.pool, recording_id)
            .await
            .map_err(|e| ServiceError::Io(format!("store read failed: {}", e)))?
        else {
            return Ok(None);
        };

        tracing::info!(recording_id, force, "Reprocessing recording");
        let cancel = self.shutdown.child_token();
        let outcome = self.processor.process(recording, force, &cancel).await?;
        Ok(Some(outcome))
    }
}
