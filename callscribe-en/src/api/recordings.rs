//! Recording endpoints: listing, detail, ingest, reprocess, stats

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::db::recordings::{aggregate_stats, get_recording, list_recordings, RecordingFilter, StoreStats};
use crate::error::{ApiError, ApiResult};
use crate::models::{IngestReport, ProcessingOutcome, ProcessingStatus, Recording};
use crate::pipeline::IngestWindow;
use crate::AppState;

const DEFAULT_WINDOW_HOURS: i64 = 24;
const DEFAULT_MAX_RESULTS: usize = 100;

pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route("/recordings", get(list))
        .route("/recordings/fetch", post(fetch))
        .route("/recordings/stats/summary", get(stats))
        .route("/recordings/:recording_id", get(detail))
        .route("/recordings/:recording_id/reprocess", post(reprocess))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Recording>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            ProcessingStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {}", s)))
        })
        .transpose()?;

    let filter = RecordingFilter {
        status,
        from: query.from,
        to: query.to,
        limit: query.limit.unwrap_or(50).clamp(1, 500),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let recordings = list_recordings(&state.db, &filter).await?;
    Ok(Json(recordings))
}

async fn detail(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> ApiResult<Json<Recording>> {
    get_recording(&state.db, &recording_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recording {} not found", recording_id)))
}

#[derive(Debug, Default, Deserialize)]
struct FetchRequest {
    service_type: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    max_results: Option<usize>,
}

/// Discover and process recordings from the platform.
///
/// Defaults to the last 24 hours when no window is given. Runs the batch
/// to completion before responding; a batch abort is reported inside the
/// body, not as a transport error.
async fn fetch(
    State(state): State<AppState>,
    body: Option<Json<FetchRequest>>,
) -> ApiResult<Json<IngestReport>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let to = request.to.unwrap_or_else(Utc::now);
    let from = request
        .from
        .unwrap_or_else(|| to - Duration::hours(DEFAULT_WINDOW_HOURS));
    if from >= to {
        return Err(ApiError::BadRequest(
            "from must be earlier than to".to_string(),
        ));
    }

    let window = IngestWindow {
        service_type: request
            .service_type
            .unwrap_or_else(|| state.service_type.clone()),
        from,
        to,
        max_results: request.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
    };

    let report = state.orchestrator.ingest_new(window).await?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
struct ReprocessQuery {
    /// Both the bare flag `?force` and `?force=true` enable it
    force: Option<String>,
}

fn force_enabled(value: Option<&str>) -> bool {
    match value {
        None | Some("false") | Some("0") => false,
        Some(_) => true,
    }
}

async fn reprocess(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Query(query): Query<ReprocessQuery>,
) -> ApiResult<Json<ProcessingOutcome>> {
    let force = force_enabled(query.force.as_deref());

    state
        .orchestrator
        .reprocess(&recording_id, force)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recording {} not found", recording_id)))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<StoreStats>> {
    let stats = aggregate_stats(&state.db).await?;
    Ok(Json(stats))
}
