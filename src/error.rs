use std::fmt;
use thiserror::Error;

use crate::cache::CacheError;
use crate::forecast::ProviderError;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to load configuration: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid coordinate format: {0}")]
    InvalidCoordinate(String),

    #[error("GeoIP database error: {0}")]
    GeoIpDatabase(#[from] maxminddb::MaxMindDBError),

    #[error("Invalid time window: {0}")]
    TimeWindow(String),

    #[error("Invalid histogram request: {0}")]
    Histogram(String),

    #[error("No forecasts returned")]
    NoForecasts { lines_processed: usize },

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Failure tied to a single input row. Never aborts the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("IP address column {column} missing, row has {found} fields")]
    MissingIpField { column: usize, found: usize },

    #[error("'{0}' does not appear to be an IPv4 or IPv6 address")]
    InvalidIpAddress(String),

    #[error("No entry found in geodb")]
    GeoIpMiss,

    #[error("GeoIP lookup failed: {0}")]
    GeoIpLookup(String),

    #[error("{0}")]
    Forecast(#[from] ResolveError),
}

/// Failure resolving a forecast through the cache and provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("{0}")]
    Cache(String),

    #[error("{0}")]
    Provider(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },
}

impl From<CacheError> for ResolveError {
    fn from(err: CacheError) -> Self {
        ResolveError::Cache(err.to_string())
    }
}

impl From<ProviderError> for ResolveError {
    fn from(err: ProviderError) -> Self {
        ResolveError::Provider(err.to_string())
    }
}

/// Grouping key for the error report. Rows fail into the same bucket when their
/// failure messages are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorKind(String);

impl ErrorKind {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&RowError> for ErrorKind {
    fn from(err: &RowError) -> Self {
        Self(err.to_string())
    }
}

impl From<&str> for ErrorKind {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
