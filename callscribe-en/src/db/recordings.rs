//! Recording persistence
//!
//! Upsert-by-identifier semantics: re-ingesting an identifier updates the
//! existing row and never duplicates it. `created_at` is set on first
//! insert and preserved on every later write. Writers racing on the same
//! identifier are serialized by the orchestrator's per-identifier lock;
//! writes to distinct identifiers run concurrently on the pool.

use callscribe_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::models::{ProcessingStatus, Recording, SentimentLabel, TranscriptSource};

/// Filters for listing stored recordings
#[derive(Debug, Clone)]
pub struct RecordingFilter {
    pub status: Option<ProcessingStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for RecordingFilter {
    fn default() -> Self {
        Self {
            status: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Aggregate statistics over stored recordings
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub with_transcript: i64,
    pub with_summary: i64,
    pub avg_quality_score: f64,
    pub total_storage_bytes: i64,
}

/// Insert or update a recording row keyed by `recording_id`
pub async fn upsert_recording(pool: &SqlitePool, recording: &Recording) -> Result<()> {
    // Prepare all serialized data before touching the pool
    let participants = to_json_opt(&recording.participants)?;
    let platform_metadata = to_json_opt(&recording.platform_metadata)?;
    let transcript_segments = to_json(&recording.transcript_segments)?;
    let summary_bullets = to_json(&recording.summary_bullets)?;
    let key_topics = to_json(&recording.key_topics)?;
    let action_items = to_json(&recording.action_items)?;
    let steps_completed = to_json(&recording.steps_completed)?;
    let step_errors = to_json(&recording.step_errors)?;

    sqlx::query(
        r#"
        INSERT INTO recordings (
            recording_id, timestamp, duration_seconds,
            caller, callee, caller_name, callee_name,
            service_type, provider_type, participants, platform_metadata,
            audio_remote_ref, audio_local_path, audio_format,
            audio_size_bytes, audio_duration_seconds,
            transcript_text, transcript_source, transcript_segments,
            detected_language, language_confidence,
            summary_text, summary_bullets, key_topics, action_items,
            sentiment_score, sentiment_label,
            status, steps_completed, step_errors, quality_score,
            processing_started_at, processing_completed_at, processing_duration_seconds,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(recording_id) DO UPDATE SET
            timestamp = excluded.timestamp,
            duration_seconds = excluded.duration_seconds,
            caller = excluded.caller,
            callee = excluded.callee,
            caller_name = excluded.caller_name,
            callee_name = excluded.callee_name,
            service_type = excluded.service_type,
            provider_type = excluded.provider_type,
            participants = excluded.participants,
            platform_metadata = excluded.platform_metadata,
            audio_remote_ref = excluded.audio_remote_ref,
            audio_local_path = excluded.audio_local_path,
            audio_format = excluded.audio_format,
            audio_size_bytes = excluded.audio_size_bytes,
            audio_duration_seconds = excluded.audio_duration_seconds,
            transcript_text = excluded.transcript_text,
            transcript_source = excluded.transcript_source,
            transcript_segments = excluded.transcript_segments,
            detected_language = excluded.detected_language,
            language_confidence = excluded.language_confidence,
            summary_text = excluded.summary_text,
            summary_bullets = excluded.summary_bullets,
            key_topics = excluded.key_topics,
            action_items = excluded.action_items,
            sentiment_score = excluded.sentiment_score,
            sentiment_label = excluded.sentiment_label,
            status = excluded.status,
            steps_completed = excluded.steps_completed,
            step_errors = excluded.step_errors,
            quality_score = excluded.quality_score,
            processing_started_at = excluded.processing_started_at,
            processing_completed_at = excluded.processing_completed_at,
            processing_duration_seconds = excluded.processing_duration_seconds,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&recording.recording_id)
    .bind(recording.timestamp.to_rfc3339())
    .bind(recording.duration_seconds)
    .bind(&recording.caller)
    .bind(&recording.callee)
    .bind(&recording.caller_name)
    .bind(&recording.callee_name)
    .bind(&recording.service_type)
    .bind(&recording.provider_type)
    .bind(participants)
    .bind(platform_metadata)
    .bind(&recording.audio_remote_ref)
    .bind(&recording.audio_local_path)
    .bind(&recording.audio_format)
    .bind(recording.audio_size_bytes)
    .bind(recording.audio_duration_seconds)
    .bind(&recording.transcript_text)
    .bind(recording.transcript_source.as_str())
    .bind(transcript_segments)
    .bind(&recording.detected_language)
    .bind(recording.language_confidence)
    .bind(&recording.summary_text)
    .bind(summary_bullets)
    .bind(key_topics)
    .bind(action_items)
    .bind(recording.sentiment_score)
    .bind(recording.sentiment_label.map(|l| l.as_str()))
    .bind(recording.status.as_str())
    .bind(steps_completed)
    .bind(step_errors)
    .bind(recording.quality_score)
    .bind(recording.processing_started_at.map(|dt| dt.to_rfc3339()))
    .bind(recording.processing_completed_at.map(|dt| dt.to_rfc3339()))
    .bind(recording.processing_duration_seconds)
    .bind(recording.created_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch one recording by its platform identifier
pub async fn get_recording(pool: &SqlitePool, recording_id: &str) -> Result<Option<Recording>> {
    let row = sqlx::query("SELECT * FROM recordings WHERE recording_id = ?")
        .bind(recording_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| recording_from_row(&r)).transpose()
}

/// True if a row with this identifier already exists
pub async fn recording_exists(pool: &SqlitePool, recording_id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recordings WHERE recording_id = ?")
        .bind(recording_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// List recordings with optional status/date filters, newest first
pub async fn list_recordings(
    pool: &SqlitePool,
    filter: &RecordingFilter,
) -> Result<Vec<Recording>> {
    let mut sql = String::from("SELECT * FROM recordings WHERE 1=1");
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.from.is_some() {
        sql.push_str(" AND timestamp >= ?");
    }
    if filter.to.is_some() {
        sql.push_str(" AND timestamp <= ?");
    }
    sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(from) = filter.from {
        query = query.bind(from.to_rfc3339());
    }
    if let Some(to) = filter.to {
        query = query.bind(to.to_rfc3339());
    }
    query = query.bind(filter.limit.max(0)).bind(filter.offset.max(0));

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(recording_from_row).collect()
}

/// Aggregate statistics for the dashboard endpoint
pub async fn aggregate_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recordings")
        .fetch_one(pool)
        .await?;

    let status_rows = sqlx::query("SELECT status, COUNT(*) AS n FROM recordings GROUP BY status")
        .fetch_all(pool)
        .await?;
    let mut by_status = BTreeMap::new();
    for row in status_rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        by_status.insert(status, n);
    }

    let with_transcript: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recordings WHERE transcript_text IS NOT NULL AND transcript_text != ''",
    )
    .fetch_one(pool)
    .await?;

    let with_summary: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recordings WHERE summary_text IS NOT NULL AND summary_text != ''",
    )
    .fetch_one(pool)
    .await?;

    let avg_quality_score: f64 =
        sqlx::query_scalar("SELECT COALESCE(AVG(quality_score), 0.0) FROM recordings")
            .fetch_one(pool)
            .await?;

    let total_storage_bytes: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(audio_size_bytes), 0) FROM recordings")
            .fetch_one(pool)
            .await?;

    Ok(StoreStats {
        total,
        by_status,
        with_transcript,
        with_summary,
        avg_quality_score,
        total_storage_bytes,
    })
}

fn recording_from_row(row: &SqliteRow) -> Result<Recording> {
    let transcript_source: String = row.get("transcript_source");
    let sentiment_label: Option<String> = row.get("sentiment_label");
    let status: String = row.get("status");

    Ok(Recording {
        recording_id: row.get("recording_id"),
        timestamp: parse_datetime(row.get("timestamp"))?,
        duration_seconds: row.get("duration_seconds"),
        caller: row.get("caller"),
        callee: row.get("callee"),
        caller_name: row.get("caller_name"),
        callee_name: row.get("callee_name"),
        service_type: row.get("service_type"),
        provider_type: row.get("provider_type"),
        participants: from_json_opt(row.get("participants"))?,
        platform_metadata: from_json_opt(row.get("platform_metadata"))?,
        audio_remote_ref: row.get("audio_remote_ref"),
        audio_local_path: row.get("audio_local_path"),
        audio_format: row.get("audio_format"),
        audio_size_bytes: row.get("audio_size_bytes"),
        audio_duration_seconds: row.get("audio_duration_seconds"),
        transcript_text: row.get("transcript_text"),
        transcript_source: TranscriptSource::parse(&transcript_source),
        transcript_segments: from_json(row.get("transcript_segments"))?,
        detected_language: row.get("detected_language"),
        language_confidence: row.get("language_confidence"),
        summary_text: row.get("summary_text"),
        summary_bullets: from_json(row.get("summary_bullets"))?,
        key_topics: from_json(row.get("key_topics"))?,
        action_items: from_json(row.get("action_items"))?,
        sentiment_score: row.get("sentiment_score"),
        sentiment_label: sentiment_label.as_deref().and_then(SentimentLabel::parse),
        status: ProcessingStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown status in store: {}", status)))?,
        steps_completed: from_json(row.get("steps_completed"))?,
        step_errors: from_json(row.get("step_errors"))?,
        quality_score: row.get("quality_score"),
        processing_started_at: parse_datetime_opt(row.get("processing_started_at"))?,
        processing_completed_at: parse_datetime_opt(row.get("processing_completed_at"))?,
        processing_duration_seconds: row.get("processing_duration_seconds"),
        created_at: parse_datetime(row.get("created_at"))?,
        updated_at: parse_datetime(row.get("updated_at"))?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize field: {}", e)))
}

fn to_json_opt(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    value.as_ref().map(|v| to_json(v)).transpose()
}

fn from_json<T: serde::de::DeserializeOwned>(raw: String) -> Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize field: {}", e)))
}

fn from_json_opt(raw: Option<String>) -> Result<Option<serde_json::Value>> {
    raw.map(from_json).transpose()
}

fn parse_datetime(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))
}

fn parse_datetime_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_datetime).transpose()
}
