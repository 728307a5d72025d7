/// Input log layout
pub const LOG_DELIMITER: u8 = b'\t';
pub const DEFAULT_IP_COLUMN: usize = 23;

/// Output histogram layout
pub const HISTOGRAM_DELIMITER: u8 = b'\t';
pub const HISTOGRAM_HEADER: [&str; 3] = ["bucketMin", "bucketMax", "count"];

/// Error report
pub const NO_ERRORS_MESSAGE: &str = "No errors found.";

/// Forecast cache
pub const CACHE_KEY_PREFIX: &str = "forecast-max";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400; // 1 day
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// OpenWeatherMap forecast API
pub const FORECAST_API_URI: &str = "http://api.openweathermap.org/data/2.5/forecast";
pub const FORECAST_STEP_HOURS: i64 = 3;
pub const FORECAST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Processing defaults
pub const DEFAULT_CONFIG_FILE: &str = "config/weather.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const ENV_PREFIX: &str = "WEATHERLOG";
