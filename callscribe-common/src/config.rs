//! Configuration loading and data folder resolution
//!
//! The enrichment service resolves its data folder with a fixed priority
//! order, then reads the rest of its settings from `callscribe.toml` with
//! environment-variable overrides applied by the service crate.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file (`callscribe.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder override (audio, transcripts, database live under it)
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub telephony: TelephonySection,

    #[serde(default)]
    pub stt: SttSection,

    #[serde(default)]
    pub enrichment: EnrichmentSection,

    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Telephony platform API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelephonySection {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub service_type: Option<String>,
    /// Minimum interval between platform calls, shared across all workers
    pub rate_limit_ms: Option<u64>,
}

/// Fallback speech-to-text settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SttSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Summarization service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Bounded worker pool size for concurrent recording processing
    pub worker_permits: Option<usize>,
    /// HTTP bind address for the service
    pub bind_addr: Option<String>,
}

/// Resolve the data folder following the priority order:
/// 1. Explicit argument (tests, embedding callers)
/// 2. `CALLSCRIBE_DATA_DIR` environment variable
/// 3. `data_dir` key in the TOML config
/// 4. OS-dependent default (`<local data dir>/callscribe`)
pub fn resolve_data_dir(explicit: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("CALLSCRIBE_DATA_DIR") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_dir {
        return path.clone();
    }

    dirs::data_local_dir()
        .map(|d| d.join("callscribe"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/callscribe"))
}

/// Default configuration file path (`<config dir>/callscribe/callscribe.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("callscribe").join("callscribe.toml"))
}

/// Load the TOML config, returning defaults when the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No TOML config found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
