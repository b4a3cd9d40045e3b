//! The fixed step ladder
//!
//! Six steps, always in this order. The denominator of the quality score
//! is the full ladder length even when conditional steps don't apply, so
//! scores stay comparable across recordings with and without transcripts.

use serde::{Deserialize, Serialize};

/// Fixed quality-score denominator
pub const TOTAL_STEPS: usize = 6;

/// One pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Retrieve full call facts and artifact links. Failure here is fatal
    /// for the recording; nothing downstream can run without details.
    FetchDetails,
    /// Best-effort extended platform metadata
    FetchMetadata,
    /// Download the audio artifact to the date-partitioned store
    DownloadAudio,
    /// Obtain a transcript (platform captions, then fallback STT)
    ResolveTranscript,
    /// Summarize the transcript; only applicable when one exists
    Summarize,
    /// Detect the transcript language; only applicable when one exists
    DetectLanguage,
}

impl Step {
    /// Execution order
    pub const ALL: [Step; TOTAL_STEPS] = [
        Step::FetchDetails,
        Step::FetchMetadata,
        Step::DownloadAudio,
        Step::ResolveTranscript,
        Step::Summarize,
        Step::DetectLanguage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::FetchDetails => "fetch_details",
            Step::FetchMetadata => "fetch_metadata",
            Step::DownloadAudio => "download_audio",
            Step::ResolveTranscript => "resolve_transcript",
            Step::Summarize => "summarize",
            Step::DetectLanguage => "detect_language",
        }
    }

    /// Steps with no meaning when the recording has no transcript
    pub fn requires_transcript(&self) -> bool {
        matches!(self, Step::Summarize | Step::DetectLanguage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_has_fixed_length_and_order() {
        assert_eq!(Step::ALL.len(), TOTAL_STEPS);
        assert_eq!(Step::ALL[0], Step::FetchDetails);
        assert_eq!(Step::ALL[5], Step::DetectLanguage);
    }

    #[test]
    fn only_enrichment_steps_need_a_transcript() {
        let needing: Vec<_> = Step::ALL
            .iter()
            .filter(|s| s.requires_transcript())
            .map(|s| s.name())
            .collect();
        assert_eq!(needing, vec!["summarize", "detect_language"]);
    }
}
