//! Database access for the enrichment service

pub mod recordings;

use callscribe_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the database connection pool, creating the file and schema
/// as needed
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create service tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            recording_id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            duration_seconds REAL,
            caller TEXT,
            callee TEXT,
            caller_name TEXT,
            callee_name TEXT,
            service_type TEXT,
            provider_type TEXT,
            participants TEXT,
            platform_metadata TEXT,
            audio_remote_ref TEXT,
            audio_local_path TEXT,
            audio_format TEXT,
            audio_size_bytes INTEGER,
            audio_duration_seconds REAL,
            transcript_text TEXT,
            transcript_source TEXT NOT NULL DEFAULT 'none',
            transcript_segments TEXT NOT NULL DEFAULT '[]',
            detected_language TEXT,
            language_confidence REAL,
            summary_text TEXT,
            summary_bullets TEXT NOT NULL DEFAULT '[]',
            key_topics TEXT NOT NULL DEFAULT '[]',
            action_items TEXT NOT NULL DEFAULT '[]',
            sentiment_score REAL,
            sentiment_label TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            steps_completed TEXT NOT NULL DEFAULT '[]',
            step_errors TEXT NOT NULL DEFAULT '{}',
            quality_score REAL NOT NULL DEFAULT 0.0,
            processing_started_at TEXT,
            processing_completed_at TEXT,
            processing_duration_seconds REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recordings_timestamp ON recordings(timestamp)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (recordings)");

    Ok(())
}
