//! Runtime configuration.
//!
//! Loaded once at startup from a JSON file, with `WEATHERLOG__SECTION__KEY` environment
//! variables layered on top, then validated. The resulting [`AppConfig`] is passed into
//! constructors explicitly.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::error::Result;
use crate::utils::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_IP_COLUMN, DEFAULT_REDIS_PORT, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_PREFIX, FORECAST_API_URI,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub log_processor: LogProcessorConfig,

    pub geoip_db: GeoIpConfig,

    #[validate(nested)]
    pub weather_api: WeatherApiConfig,

    #[validate(nested)]
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogProcessorConfig {
    /// Grid step in degrees used to quantize coordinates
    #[validate(range(exclusive_min = 0.0))]
    pub geo_precision: f64,

    #[serde(default = "default_ip_column")]
    pub ip_column: usize,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[validate(range(min = 1))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl LogProcessorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Standard,
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WeatherApiConfig {
    #[validate(length(min = 1))]
    pub api_key: String,

    #[serde(default)]
    pub units: Units,

    #[validate(length(min = 1))]
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default = "default_cache_host")]
    pub host: String,

    #[validate(range(min = 1))]
    #[serde(default = "default_cache_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub db: i64,

    #[validate(range(min = 1))]
    #[serde(default = "default_key_expiry_secs")]
    pub key_expiry_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.key_expiry_secs)
    }

    pub fn redis_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            host: default_cache_host(),
            port: default_cache_port(),
            password: None,
            db: 0,
            key_expiry_secs: default_key_expiry_secs(),
        }
    }
}

fn default_ip_column() -> usize {
    DEFAULT_IP_COLUMN
}

fn default_max_workers() -> usize {
    num_cpus::get()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_base_url() -> String {
    FORECAST_API_URI.to_string()
}

fn default_cache_host() -> String {
    "localhost".to_string()
}

fn default_cache_port() -> u16 {
    DEFAULT_REDIS_PORT
}

fn default_key_expiry_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl AppConfig {
    /// Load from a JSON file plus environment overrides, then validate
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Self::from_settings(settings)
    }

    /// Parse configuration held in memory (no environment layering)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self> {
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
