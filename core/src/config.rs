/// Configuration for the translation system
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::ProviderId;
use crate::ai::retry::{Backoff, RetryPolicy};
use crate::client::BatchLimits;

pub const CACHE_FILE_NAME: &str = "translation_memory.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryOptions {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub fixed_backoff: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_retries: 3,
            fixed_backoff: false,
        }
    }
}

impl RetryOptions {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = if self.fixed_backoff {
            Backoff::Fixed
        } else {
            Backoff::Exponential
        };
        RetryPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_retries,
        )
        .with_backoff(backoff)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    pub provider: ProviderId,
    /// Minimum spacing between provider HTTP requests.
    pub request_interval_ms: u64,
    pub batch_max_items: usize,
    pub batch_max_bytes: usize,
    pub http_timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            provider: ProviderId::Google,
            request_interval_ms: 200,
            batch_max_items: 8,
            batch_max_bytes: 16 * 1024,
            http_timeout_secs: 30,
        }
    }
}

impl ClientOptions {
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_items: self.batch_max_items.max(1),
            max_bytes: self.batch_max_bytes.max(1),
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslatorConfig {
    /// Mods folder; `None` falls back to `mods/` in the working directory.
    pub mods_dir: Option<PathBuf>,
    pub source_lang: String,
    pub target_lang: String,
    /// Concurrent files/batches in flight.
    pub workers: usize,
    /// Translation memory location; `None` puts it next to the mods.
    pub cache_file: Option<PathBuf>,
    pub client: ClientOptions,
    pub retry: RetryOptions,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            mods_dir: None,
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            workers: 4,
            cache_file: None,
            client: ClientOptions::default(),
            retry: RetryOptions::default(),
        }
    }
}

impl TranslatorConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| format!("Failed to write config file: {}", e))
    }

    /// Default location: `<config dir>/hytale-translator/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hytale-translator").join("config.json"))
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("mods"))
    }

    /// The translation memory lives next to the mods it serves unless
    /// pointed elsewhere.
    pub fn cache_file(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| self.mods_dir().join(CACHE_FILE_NAME))
    }
}
