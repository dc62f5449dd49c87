//! Runtime configuration.
//!
//! Loaded from YAML (every field optional), then overridden from `REFINE_*`
//! environment variables, then validated.
//!
//! ```yaml
//! model_id: gpt-4o-mini
//! cache_max_size: 100
//! request_timeout_ms: null   # no per-call deadline
//! ```

use crate::cache::CacheConfig;
use crate::resilience::RetryPolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub model_id: String,
    pub base_url: String,
    pub cache_enabled: bool,
    pub cache_max_size: usize,
    pub cache_ttl_ms: u64,
    pub token_warning_threshold: f64,
    pub max_prompt_tokens: usize,
    /// Maximum attempts, first call included.
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub progress_every: usize,
    pub active_file_max_chars: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            model_id: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            cache_enabled: true,
            cache_max_size: 50,
            cache_ttl_ms: 3_600_000,
            token_warning_threshold: 0.8,
            max_prompt_tokens: 8_000,
            max_retries: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 30_000,
            request_timeout_ms: Some(60_000),
            progress_every: 5,
            active_file_max_chars: 4_000,
        }
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Err(_) => Ok(None),
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("invalid value for {}", name),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(format!("got {:?}", raw))
                    .with_source("env"),
            )
        }),
    }
}

impl RefineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Applies `REFINE_*` environment overrides. `REFINE_TIMEOUT_MS=0` disables the timeout.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_value::<String>("REFINE_MODEL")? {
            self.model_id = v;
        }
        if let Some(v) = env_value::<String>("REFINE_BASE_URL")? {
            self.base_url = v;
        }
        if let Some(v) = env_value("REFINE_CACHE_MAX_SIZE")? {
            self.cache_max_size = v;
        }
        if let Some(v) = env_value("REFINE_CACHE_TTL_MS")? {
            self.cache_ttl_ms = v;
        }
        if let Some(v) = env_value("REFINE_TOKEN_WARNING_THRESHOLD")? {
            self.token_warning_threshold = v;
        }
        if let Some(v) = env_value("REFINE_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_value("REFINE_INITIAL_RETRY_DELAY_MS")? {
            self.initial_retry_delay_ms = v;
        }
        if let Some(v) = env_value::<u64>("REFINE_TIMEOUT_MS")? {
            self.request_timeout_ms = if v == 0 { None } else { Some(v) };
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, details: String| {
            Err(Error::validation_with_context(
                format!("invalid configuration value for {}", field),
                ErrorContext::new()
                    .with_field_path(format!("config.{}", field))
                    .with_details(details)
                    .with_source("config"),
            ))
        };

        if self.model_id.trim().is_empty() {
            return invalid("model_id", "must not be empty".into());
        }
        if self.cache_max_size == 0 {
            return invalid("cache_max_size", "must be at least 1".into());
        }
        if !(self.token_warning_threshold > 0.0 && self.token_warning_threshold <= 1.0) {
            return invalid(
                "token_warning_threshold",
                format!("expected (0, 1], got {}", self.token_warning_threshold),
            );
        }
        if self.max_prompt_tokens == 0 {
            return invalid("max_prompt_tokens", "must be at least 1".into());
        }
        if self.max_retries == 0 {
            return invalid("max_retries", "must be at least 1".into());
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            return invalid("base_url", e.to_string());
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.cache_enabled)
            .with_max_size(self.cache_max_size)
            .with_ttl(Duration::from_millis(self.cache_ttl_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_retry_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
