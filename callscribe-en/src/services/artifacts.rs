//! Date-partitioned artifact layout
//!
//! Downloaded audio and caption files live under the data folder at
//! `recordings/YYYY/MM/DD/<recording_id>.mp3` and
//! `transcripts/YYYY/MM/DD/<recording_id>.vtt`. Paths are partitioned by
//! the recording's own call timestamp, not the wall clock, so a reprocess
//! months later resolves the same path and reuses the artifact.

use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn audio_path(&self, recording_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.partitioned(
            "recordings",
            recording_id,
            timestamp,
            "mp3",
        )
    }

    pub fn transcript_path(&self, recording_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.partitioned("transcripts", recording_id, timestamp, "vtt")
    }

    fn partitioned(
        &self,
        kind: &str,
        recording_id: &str,
        timestamp: DateTime<Utc>,
        ext: &str,
    ) -> PathBuf {
        self.data_dir
            .join(kind)
            .join(format!("{:04}", timestamp.year()))
            .join(format!("{:02}", timestamp.month()))
            .join(format!("{:02}", timestamp.day()))
            .join(format!("{}.{}", recording_id, ext))
    }

    /// Create the parent directory for an artifact path
    pub async fn ensure_parent(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn paths_are_partitioned_by_call_date() {
        let store = ArtifactStore::new("/data");
        let ts = Utc.with_ymd_and_hms(2026, 3, 7, 14, 30, 0).unwrap();

        assert_eq!(
            store.audio_path("rec-42", ts),
            PathBuf::from("/data/recordings/2026/03/07/rec-42.mp3")
        );
        assert_eq!(
            store.transcript_path("rec-42", ts),
            PathBuf::from("/data/transcripts/2026/03/07/rec-42.vtt")
        );
    }

    #[test]
    fn same_recording_same_path_regardless_of_now() {
        let store = ArtifactStore::new("/data");
        let ts = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();

        let first = store.audio_path("rec-1", ts);
        let second = store.audio_path("rec-1", ts);
        assert_eq!(first, second);
    }
}
