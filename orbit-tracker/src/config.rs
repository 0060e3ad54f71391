use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

pub static CONFIG: OnceLock<TrackerConfig> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub geocode: GeocodeConfig,
}

/// Element-set provider endpoint and fetch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Number of objects requested when the caller does not say
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_group_timeout")]
    pub group_timeout_secs: u64,

    #[serde(default = "default_full_timeout")]
    pub full_timeout_secs: u64,

    /// Minimum row count requested when a group fetch falls back to the full catalog
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,

    /// Group results smaller than this are taken as-is; larger ones are re-filtered locally
    #[serde(default = "default_narrow_trust_threshold")]
    pub narrow_trust_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Wall-clock seconds for one full loop over the horizon
    #[serde(default = "default_loop_period")]
    pub loop_period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    #[serde(default = "default_geocode_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_geocode_timeout")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_cache_dir() -> String {
    "data".to_string()
}

fn default_provider_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_limit() -> usize {
    600
}

fn default_group_timeout() -> u64 {
    15
}

fn default_full_timeout() -> u64 {
    30
}

fn default_fallback_limit() -> usize {
    10_000
}

fn default_narrow_trust_threshold() -> usize {
    500
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    800
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_frame_interval() -> u64 {
    1000
}

fn default_batch_chunk_size() -> usize {
    512
}

fn default_loop_period() -> u64 {
    10
}

fn default_geocode_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("orbit-tracker/{}", env!("CARGO_PKG_VERSION"))
}

fn default_geocode_timeout() -> u64 {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            cache_dir: default_cache_dir(),
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            refresh: RefreshConfig::default(),
            playback: PlaybackConfig::default(),
            geocode: GeocodeConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            default_limit: default_limit(),
            group_timeout_secs: default_group_timeout(),
            full_timeout_secs: default_full_timeout(),
            fallback_limit: default_fallback_limit(),
            narrow_trust_threshold: default_narrow_trust_threshold(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            frame_interval_ms: default_frame_interval(),
            batch_chunk_size: default_batch_chunk_size(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_period_secs: default_loop_period(),
        }
    }
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocode_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocode_timeout(),
        }
    }
}

impl TrackerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TrackerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl ProviderConfig {
    pub fn group_timeout(&self) -> Duration {
        Duration::from_secs(self.group_timeout_secs)
    }

    pub fn full_timeout(&self) -> Duration {
        Duration::from_secs(self.full_timeout_secs)
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Load the process-wide configuration.
///
/// A missing file is not an error: every field has a default.
pub fn read_config(path: &str) -> anyhow::Result<&'static TrackerConfig> {
    let config = if std::path::Path::new(path).exists() {
        TrackerConfig::from_file(path)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path);
        TrackerConfig::default()
    };

    Ok(CONFIG.get_or_init(|| config))
}
