//! Settings resolution for the enrichment service
//!
//! Two-tier resolution with ENV → TOML priority. Credentials may come
//! from either source; when both are set the environment wins and a
//! warning notes the duplication.

use callscribe_common::config::{
    default_config_path, load_toml_config, resolve_data_dir, TomlConfig,
};
use callscribe_common::{Error, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_TELEPHONY_BASE_URL: &str = "https://webexapis.com/v1";
const DEFAULT_SERVICE_TYPE: &str = "callqueue";
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;
const DEFAULT_WORKER_PERMITS: usize = 4;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5841";

/// Fallback speech-to-text settings; absent when not configured
#[derive(Debug, Clone)]
pub struct SttSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
}

/// Summarization service settings; absent when not configured
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub telephony_base_url: String,
    pub telephony_token: String,
    pub service_type: String,
    pub rate_limit_ms: u64,
    pub worker_permits: usize,
    pub stt: Option<SttSettings>,
    pub enrichment: Option<EnrichmentSettings>,
}

impl Settings {
    /// Resolve settings from the TOML config with environment overrides.
    ///
    /// `explicit_data_dir` takes precedence over every other data folder
    /// source; tests use it to point at a temp folder.
    pub fn resolve(explicit_data_dir: Option<&Path>) -> Result<Self> {
        let toml_config = match default_config_path() {
            Some(path) => load_toml_config(&path)?,
            None => TomlConfig::default(),
        };

        let data_dir = resolve_data_dir(explicit_data_dir, &toml_config);
        let db_path = data_dir.join("callscribe.db");

        let telephony_token = resolve_credential(
            "CALLSCRIBE_TELEPHONY_TOKEN",
            toml_config.telephony.access_token.as_deref(),
            "telephony access token",
        )
        .ok_or_else(|| {
            Error::Config(
                "Telephony access token not configured. Set one of:\n\
                 1. Environment: CALLSCRIBE_TELEPHONY_TOKEN=your-token\n\
                 2. TOML config: callscribe.toml ([telephony] access_token = \"your-token\")"
                    .to_string(),
            )
        })?;

        let telephony_base_url = toml_config
            .telephony
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_TELEPHONY_BASE_URL.to_string());

        let service_type = toml_config
            .telephony
            .service_type
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());

        let bind_addr: SocketAddr = toml_config
            .pipeline
            .bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))?;

        let stt = resolve_credential(
            "CALLSCRIBE_STT_API_KEY",
            toml_config.stt.api_key.as_deref(),
            "STT API key",
        )
        .and_then(|api_key| {
            let base_url = toml_config.stt.base_url.clone()?;
            Some(SttSettings {
                base_url,
                api_key,
                model: toml_config.stt.model.clone(),
            })
        });
        if stt.is_none() {
            info!("Fallback STT not configured; caption-less recordings stay untranscribed");
        }

        let enrichment = resolve_credential(
            "CALLSCRIBE_ENRICHMENT_API_KEY",
            toml_config.enrichment.api_key.as_deref(),
            "enrichment API key",
        )
        .and_then(|api_key| {
            let base_url = toml_config.enrichment.base_url.clone()?;
            Some(EnrichmentSettings {
                base_url,
                api_key,
                model: toml_config.enrichment.model.clone(),
            })
        });
        if enrichment.is_none() {
            info!("Summarizer not configured; transcripts will not be summarized");
        }

        Ok(Settings {
            data_dir,
            db_path,
            bind_addr,
            telephony_base_url,
            telephony_token,
            service_type,
            rate_limit_ms: toml_config
                .telephony
                .rate_limit_ms
                .unwrap_or(DEFAULT_RATE_LIMIT_MS),
            worker_permits: toml_config
                .pipeline
                .worker_permits
                .unwrap_or(DEFAULT_WORKER_PERMITS),
            stt,
            enrichment,
        })
    }
}

/// ENV → TOML credential resolution with a duplication warning
fn resolve_credential(env_var: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.filter(|v| !v.trim().is_empty());

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML. Using environment (highest priority).",
            label
        );
    }

    match env_value {
        Some(value) => {
            info!("{} loaded from environment variable", label);
            Some(value)
        }
        None => toml_value.map(|v| {
            info!("{} loaded from TOML config", label);
            v.to_string()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_wins_over_toml() {
        // Uses a variable name no other test touches.
        std::env::set_var("CALLSCRIBE_TEST_CRED", "from-env");
        let resolved = resolve_credential("CALLSCRIBE_TEST_CRED", Some("from-toml"), "test cred");
        assert_eq!(resolved.as_deref(), Some("from-env"));
        std::env::remove_var("CALLSCRIBE_TEST_CRED");
    }

    #[test]
    fn blank_values_are_ignored() {
        std::env::set_var("CALLSCRIBE_TEST_CRED_BLANK", "   ");
        let resolved = resolve_credential("CALLSCRIBE_TEST_CRED_BLANK", Some(""), "test cred");
        assert_eq!(resolved, None);
        std::env::remove_var("CALLSCRIBE_TEST_CRED_BLANK");
    }
}
