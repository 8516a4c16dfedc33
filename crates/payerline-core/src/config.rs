//! Configuration loading from payerline.toml.
//!
//! Every tunable the orchestrator uses lives here and is injected into
//! components at construction; no component reads process environment state
//! directly. All fields have defaults, so an empty file is a valid config.
//!
//! ## Example
//!
//! ```toml
//! [voice]
//! api-key = "sk-..."
//! phone-line-id = "pl-1234"
//!
//! [rate-limit]
//! max-calls-per-payer = 2
//! window-secs = 300
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub voice: VoiceConfig,
    pub rate_limit: RateLimitConfig,
    pub dispatch: DispatchConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyConfig,
}

/// Outbound voice provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VoiceConfig {
    /// Provider API base URL, no trailing slash.
    pub base_url: String,
    /// Bearer token for the provider API. Empty means unconfigured.
    pub api_key: String,
    /// Provider id of the outbound phone line calls are placed from.
    pub phone_line_id: String,
    /// Per-request timeout for placement calls, distinct from job retry delays.
    pub request_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vapi.ai".into(),
            api_key: String::new(),
            phone_line_id: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl VoiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-payer call-rate ceiling over a fixed TTL window.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub max_calls_per_payer: u64,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_payer: 2,
            window_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Dispatch job retry policy and worker pool size.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DispatchConfig {
    /// Attempts per dispatch job before terminal failure.
    pub max_attempts: u32,
    /// Base delay between retries of transient failures.
    pub retry_delay_secs: u64,
    /// Longer cooldown when the payer is rate-limited; does not consume
    /// the retry budget.
    pub cooldown_secs: u64,
    /// Queue worker tasks; one job runs per worker slot at a time.
    pub workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 60,
            cooldown_secs: 120,
            workers: 2,
        }
    }
}

impl DispatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Scheduled-call poller cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Claimer notification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotifyConfig {
    /// Shown in notification subjects.
    pub app_name: String,
    pub from_email: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            app_name: "Payerline".into(),
            from_email: "noreply@payerline.local".into(),
        }
    }
}

impl Config {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file, or defaults when the path does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
