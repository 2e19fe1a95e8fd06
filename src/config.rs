//! Console configuration.
//!
//! Resolution order, highest first:
//! 1. Command-line flag (`--server`, `--config`)
//! 2. Environment variable (`QWEN_CONSOLE_URL`, `QWEN_CONSOLE_CONFIG`)
//! 3. TOML config file (explicit path, else `<config dir>/qwen-console/config.toml`)
//! 4. Compiled defaults
//!
//! Flags and environment are merged by the command-line parser; this module handles
//! the file and the defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConsoleError, Result};
use crate::generation::AudioFormat;
use crate::stream::Framing;

pub const SERVER_ENV: &str = "QWEN_CONSOLE_URL";
pub const CONFIG_ENV: &str = "QWEN_CONSOLE_CONFIG";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LANGUAGE: &str = "Auto";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server: ServerConfig,
    pub generation: GenerationDefaults,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Covers the whole request including a streamed body, so it has to outlast
    /// the longest generation job.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub language: String,
    pub format: AudioFormat,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            format: AudioFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub buffer_partial_records: bool,
}

impl StreamConfig {
    pub fn framing(&self) -> Framing {
        Framing::from_buffering(self.buffer_partial_records)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| ConsoleError::Config(err.to_string()))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path().filter(|path| path.exists()) {
                Some(path) => path,
                None => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|err| ConsoleError::Config(format!("Cannot read {}: {err}", path.display())))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }

    pub fn with_server(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            self.server.base_url = url;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qwen-console").join("config.toml"))
}
