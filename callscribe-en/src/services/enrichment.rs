//! Summarization and language detection over the transcript
//!
//! The summarizer posts the transcript to an LLM-style chat-completions
//! endpoint and parses a JSON object out of the reply. The reply is
//! allowed to be partial: missing bullets/topics/action items degrade to
//! empty, missing sentiment degrades to neutral, but a reply without a
//! `summary` is a malformed response and fails the step.

use super::ServiceError;
use crate::models::SentimentLabel;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

const SUMMARIZE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
/// Transcript tail is cut to keep the request inside token limits
const MAX_TRANSCRIPT_CHARS: usize = 4000;

/// Structured enrichment extracted from one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSummary {
    pub summary: String,
    pub bullets: Vec<String>,
    pub topics: BTreeSet<String>,
    pub action_items: Vec<String>,
    /// Clamped to [-1, 1]
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
}

/// Detected language with heuristic confidence
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    /// ISO-639-1 code
    pub code: String,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// External summarization capability
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<CallSummary, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Production chat-completions summarizer
pub struct LlmSummarizer {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmSummarizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: Option<String>,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SUMMARIZE_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn build_prompt(transcript: &str) -> String {
        let excerpt = truncate_chars(transcript, MAX_TRANSCRIPT_CHARS);
        format!(
            "Analyze this call recording transcript and provide:\n\
             \n\
             1. A concise summary (2-3 sentences)\n\
             2. Key bullet points (3-5 main points)\n\
             3. Topics discussed\n\
             4. Action items identified\n\
             5. Sentiment analysis (score from -1.0 to 1.0 and label)\n\
             \n\
             Transcript:\n\
             {}\n\
             \n\
             Respond in JSON format:\n\
             {{\n\
               \"summary\": \"...\",\n\
               \"bullet_points\": [\"...\"],\n\
               \"topics\": [\"...\"],\n\
               \"action_items\": [\"...\"],\n\
               \"sentiment_score\": 0.5,\n\
               \"sentiment_label\": \"positive\"\n\
             }}",
            excerpt
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<CallSummary, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": Self::build_prompt(transcript)}],
        });

        tracing::debug!(model = %self.model, chars = transcript.len(), "Requesting summary");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ServiceError::AuthExpired,
                429 => ServiceError::QuotaExceeded(format!("summarizer returned 429: {}", body)),
                s => {
                    ServiceError::UpstreamUnavailable(format!("summarizer returned {}: {}", s, body))
                }
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        let reply = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ServiceError::MalformedResponse("no choices in reply".to_string()))?;

        parse_summary_reply(reply)
    }
}

/// Parse a model reply into a [`CallSummary`], degrading gracefully on
/// partial payloads.
pub fn parse_summary_reply(reply: &str) -> Result<CallSummary, ServiceError> {
    let payload = extract_json_payload(reply)
        .ok_or_else(|| ServiceError::MalformedResponse("no JSON object in reply".to_string()))?;

    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ServiceError::MalformedResponse(format!("invalid JSON in reply: {}", e)))?;

    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::MalformedResponse("reply missing summary".to_string()))?
        .to_string();

    let bullets = string_array(&value, "bullet_points");
    let topics: BTreeSet<String> = string_array(&value, "topics").into_iter().collect();
    let action_items = string_array(&value, "action_items");

    let sentiment_score = value
        .get("sentiment_score")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0);

    let sentiment_label = value
        .get("sentiment_label")
        .and_then(|v| v.as_str())
        .and_then(SentimentLabel::parse)
        .unwrap_or(SentimentLabel::Neutral);

    Ok(CallSummary {
        summary,
        bullets,
        topics,
        action_items,
        sentiment_score,
        sentiment_label,
    })
}

/// Extract a JSON object from a model reply, handling ```json fences and
/// bare braces.
fn extract_json_payload(reply: &str) -> Option<&str> {
    if let Some(fence_start) = reply.find("```json") {
        let after = &reply[fence_start + 7..];
        if let Some(fence_end) = after.find("```") {
            return Some(after[..fence_end].trim());
        }
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end > start {
        Some(&reply[start..=end])
    } else {
        None
    }
}

fn string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Char-boundary-safe prefix
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

const SPANISH_STOPWORDS: [&str; 10] = ["el", "la", "de", "que", "y", "a", "en", "un", "ser", "para"];
const ENGLISH_STOPWORDS: [&str; 10] = ["the", "be", "to", "of", "and", "a", "in", "that", "have", "i"];

/// Stopword-frequency language heuristic over the transcript.
///
/// Deliberately small: distinguishes the two languages the deployment
/// actually sees, with confidence scaled by stopword hits.
pub fn detect_language(text: &str) -> LanguageGuess {
    let words: BTreeSet<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();

    let spanish_count = SPANISH_STOPWORDS
        .iter()
        .filter(|w| words.contains(**w))
        .count();
    let english_count = ENGLISH_STOPWORDS
        .iter()
        .filter(|w| words.contains(**w))
        .count();

    if spanish_count > english_count {
        LanguageGuess {
            code: "es".to_string(),
            confidence: (spanish_count as f64 / 10.0).min(1.0),
        }
    } else {
        LanguageGuess {
            code: "en".to_string(),
            confidence: (english_count as f64 / 10.0).min(1.0),
        }
    }
}
