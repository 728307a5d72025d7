use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::models::QuantizedPoint;
use crate::utils::constants::CACHE_KEY_PREFIX;

/// UTC bounds of "tomorrow" for one run. `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ForecastWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(ProcessingError::TimeWindow(format!(
                "window start {} is not before end {}",
                start, end
            )));
        }

        Ok(Self { start, end })
    }

    /// Day the forecast is cached under
    pub fn forecast_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Strictly inside the window, both ends exclusive
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.start && timestamp < self.end
    }
}

/// Cache key for one grid cell on one forecast day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastKey {
    pub point: QuantizedPoint,
    pub date: NaiveDate,
}

impl ForecastKey {
    pub fn new(point: QuantizedPoint, date: NaiveDate) -> Self {
        Self { point, date }
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            CACHE_KEY_PREFIX,
            self.point.latitude,
            self.point.longitude,
            self.date.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> ForecastWindow {
        ForecastWindow::new(
            Utc.with_ymd_and_hms(2018, 6, 1, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 6, 2, 13, 59, 59).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2018, 6, 2, 0, 0, 0).unwrap();
        assert!(ForecastWindow::new(start, start).is_err());
        assert!(ForecastWindow::new(start, start - chrono::Duration::hours(1)).is_err());
    }

    #[test]
    fn test_window_bounds_are_exclusive() {
        let w = window();
        assert!(!w.contains(w.start));
        assert!(!w.contains(w.end));
        assert!(w.contains(Utc.with_ymd_and_hms(2018, 6, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_forecast_date_uses_window_start() {
        assert_eq!(
            window().forecast_date(),
            NaiveDate::from_ymd_opt(2018, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_cache_key_embeds_point_and_date() {
        let date = NaiveDate::from_ymd_opt(2018, 6, 1).unwrap();
        let a = ForecastKey::new(
            QuantizedPoint {
                latitude: -33.9,
                longitude: 151.2,
            },
            date,
        );
        let b = ForecastKey::new(
            QuantizedPoint {
                latitude: 51.5,
                longitude: -0.1,
            },
            date,
        );

        assert_eq!(a.cache_key(), "forecast-max:-33.9:151.2:2018-06-01");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(
            a.cache_key(),
            ForecastKey::new(a.point, date.succ_opt().unwrap()).cache_key()
        );
    }
}
