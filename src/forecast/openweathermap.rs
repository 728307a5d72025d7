use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Units, WeatherApiConfig};
use crate::forecast::{ForecastProvider, ProviderError};
use crate::models::{ForecastWindow, QuantizedPoint};
use crate::utils::constants::{FORECAST_STEP_HOURS, FORECAST_TIMESTAMP_FORMAT};

/// Body of the OpenWeatherMap 5 day / 3 hour forecast endpoint (only the fields used).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// UTC timestamp, `YYYY-MM-DD HH:MM:SS`
    pub dt_txt: String,
    pub main: ForecastMain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMain {
    pub temp_max: f64,
}

impl ForecastEntry {
    pub fn timestamp(&self) -> Result<DateTime<Utc>, ProviderError> {
        NaiveDateTime::parse_from_str(&self.dt_txt, FORECAST_TIMESTAMP_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| ProviderError::Decode(format!("bad dt_txt '{}': {}", self.dt_txt, e)))
    }
}

impl ForecastResponse {
    /// Maximum `temp_max` over entries strictly inside `window`
    pub fn max_temperature_in(&self, window: &ForecastWindow) -> Result<f64, ProviderError> {
        let mut max_temperature: Option<f64> = None;

        for entry in &self.list {
            if window.contains(entry.timestamp()?) {
                let temp = entry.main.temp_max;
                max_temperature = Some(max_temperature.map_or(temp, |m| m.max(temp)));
            }
        }

        max_temperature.ok_or(ProviderError::NoData)
    }
}

pub struct OpenWeatherMapClient {
    client: Client,
    base_url: String,
    api_key: String,
    units: Units,
}

impl OpenWeatherMapClient {
    pub fn new(config: &WeatherApiConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            units: config.units,
        })
    }

    /// The API returns forecasts in 3 hour slots starting now; ask for enough slots to
    /// reach the end of the window.
    pub fn result_count(end: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        let step_secs = (FORECAST_STEP_HOURS * 3600) as f64;
        let slots = ((end - now).num_seconds() as f64 / step_secs).ceil();
        slots.max(1.0) as u32
    }

    pub async fn fetch_forecast(
        &self,
        point: &QuantizedPoint,
        count: u32,
    ) -> Result<ForecastResponse, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", point.latitude.to_string()),
                ("lon", point.longitude.to_string()),
                ("cnt", count.to_string()),
                ("units", self.units.as_str().to_string()),
                ("APPID", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(ProviderError::network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus { status });
        }

        response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| ProviderError::Decode(e.without_url().to_string()))
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherMapClient {
    async fn max_temperature(
        &self,
        point: &QuantizedPoint,
        window: &ForecastWindow,
    ) -> Result<f64, ProviderError> {
        let count = Self::result_count(window.end, Utc::now());
        debug!(%point, count, "Requesting forecast");

        let forecast = self.fetch_forecast(point, count).await?;
        forecast.max_temperature_in(window)
    }
}
