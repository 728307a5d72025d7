//! Forecast providers: where tomorrow's maximum temperature comes from on a cache miss.

mod openweathermap;

pub use openweathermap::{ForecastEntry, ForecastResponse, OpenWeatherMapClient};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ForecastWindow, QuantizedPoint};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Forecast request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP error code was {}", status.as_u16())]
    HttpStatus { status: reqwest::StatusCode },

    #[error("Malformed forecast response: {0}")]
    Decode(String),

    #[error("No forecast data inside the requested window")]
    NoData,
}

impl ProviderError {
    /// Request failures carry the URL, which includes the API key
    pub(crate) fn network(err: reqwest::Error) -> Self {
        ProviderError::Network(err.without_url())
    }
}

/// Source of forecast maxima.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Highest forecast temperature strictly between `window.start` and `window.end`.
    async fn max_temperature(
        &self,
        point: &QuantizedPoint,
        window: &ForecastWindow,
    ) -> Result<f64, ProviderError>;
}
