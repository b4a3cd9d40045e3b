//! WebVTT caption parsing
//!
//! Platform caption artifacts arrive as WebVTT. The parser produces the
//! plain-text transcript (time-ordered concatenation) plus the timed
//! segment list stored alongside it.

use crate::models::TranscriptSegment;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VttError {
    #[error("malformed cue timing: {0}")]
    BadTiming(String),
}

/// Parsed caption artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCaptions {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

/// Parse WebVTT content into plain text and timed segments.
///
/// Header lines (`WEBVTT`, `NOTE`), cue identifiers, and blank lines are
/// skipped; each `-->` timing line starts a segment whose text is the
/// following non-blank lines joined with spaces.
pub fn parse_vtt(content: &str) -> Result<ParsedCaptions, VttError> {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut current: Option<TranscriptSegment> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.starts_with("WEBVTT") || line.starts_with("NOTE") {
            continue;
        }

        if line.contains("-->") {
            if let Some(seg) = current.take() {
                if !seg.text.is_empty() {
                    segments.push(seg);
                }
            }

            let mut parts = line.splitn(2, "-->");
            let start_str = parts.next().unwrap_or("").trim();
            let end_part = parts
                .next()
                .ok_or_else(|| VttError::BadTiming(line.to_string()))?;
            // Cue settings may follow the end timestamp
            let end_str = end_part
                .trim()
                .split_whitespace()
                .next()
                .ok_or_else(|| VttError::BadTiming(line.to_string()))?;

            let start = parse_timestamp(start_str)
                .ok_or_else(|| VttError::BadTiming(line.to_string()))?;
            let end =
                parse_timestamp(end_str).ok_or_else(|| VttError::BadTiming(line.to_string()))?;

            current = Some(TranscriptSegment {
                start,
                end,
                text: String::new(),
            });
            continue;
        }

        if line.is_empty() {
            if let Some(seg) = current.take() {
                if !seg.text.is_empty() {
                    segments.push(seg);
                }
            }
            continue;
        }

        // Bare numeric lines outside a cue are cue identifiers
        if current.is_none() && line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if let Some(seg) = current.as_mut() {
            if !seg.text.is_empty() {
                seg.text.push(' ');
            }
            seg.text.push_str(line);
        }
    }

    if let Some(seg) = current.take() {
        if !seg.text.is_empty() {
            segments.push(seg);
        }
    }

    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ParsedCaptions { text, segments })
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm` into seconds
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, sec] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, sec),
        [m, sec] => (0.0, m.parse::<f64>().ok()?, sec),
        _ => return None,
    };
    let secs = seconds.parse::<f64>().ok()?;
    if secs < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + secs)
}
