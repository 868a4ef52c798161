//! Configuration loaded from `config.toml`
//!
//! Every field has a default, so a missing file or an empty table is valid.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::accumulator::{AccumulatorOptions, RemainderPolicy, DEFAULT_FLUSH_THRESHOLD};
use crate::ai::client::{ClientConfig, DEFAULT_API_URL};
use crate::ai::transform::UppercaseTransform;
use crate::ai::types::{ChatMessage, ChatRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    /// Bearer token; callers may supply it from elsewhere instead
    pub api_key: Option<String>,
    pub request: RequestDefaults,
    pub pipeline: PipelineSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request: RequestDefaults::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Sampling parameters applied to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    pub n: u32,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 200,
            n: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub flush_threshold: usize,
    pub transform_delay_ms: u64,
    /// Emit the sub-threshold tail when the stream ends instead of dropping it
    pub flush_remainder: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            transform_delay_ms: 1000,
            flush_remainder: false,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/deltacast/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deltacast").join("config.toml"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Client settings using `api_key`
    pub fn client_config(&self, api_key: impl Into<String>) -> ClientConfig {
        ClientConfig::new(api_key).with_api_url(&self.api_url)
    }

    pub fn accumulator_options(&self) -> AccumulatorOptions {
        AccumulatorOptions {
            flush_threshold: self.pipeline.flush_threshold,
            remainder: if self.pipeline.flush_remainder {
                RemainderPolicy::Flush
            } else {
                RemainderPolicy::Discard
            },
        }
    }

    pub fn transform(&self) -> Arc<UppercaseTransform> {
        Arc::new(UppercaseTransform::new(Duration::from_millis(
            self.pipeline.transform_delay_ms,
        )))
    }

    /// Build a request carrying the configured sampling parameters
    pub fn chat_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let r = &self.request;
        ChatRequest::new(&r.model, messages)
            .with_temperature(r.temperature)
            .with_top_p(r.top_p)
            .with_penalties(r.frequency_penalty, r.presence_penalty)
            .with_max_tokens(r.max_tokens)
            .with_n(r.n)
    }
}
