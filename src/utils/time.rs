//! Calendar math for the "tomorrow" forecast window.
//!
//! Tomorrow is the next calendar day in the caller's timezone; both bounds are returned
//! in UTC. Everything is generic over [`TimeZone`] so the functions can be exercised with
//! fixed offsets.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{ProcessingError, Result};
use crate::models::ForecastWindow;

/// Midnight at the start of tomorrow, local to `now`, expressed in UTC.
///
/// If it's 8pm in Sydney on 1 June 2018, this is 12am Sydney on 2 June, i.e.
/// 1 June 14:00 UTC.
pub fn start_of_tomorrow_utc<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<DateTime<Utc>> {
    let naive = tomorrow(now)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ProcessingError::TimeWindow("invalid start of day".to_string()))?;
    localize(&now.timezone(), naive)
}

/// Last representable instant of tomorrow, local to `now`, expressed in UTC.
pub fn end_of_tomorrow_utc<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<DateTime<Utc>> {
    let end_of_day = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .ok_or_else(|| ProcessingError::TimeWindow("invalid end of day".to_string()))?;
    localize(&now.timezone(), tomorrow(now)?.and_time(end_of_day))
}

pub fn tomorrow_window<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<ForecastWindow> {
    ForecastWindow::new(start_of_tomorrow_utc(now)?, end_of_tomorrow_utc(now)?)
}

/// Tomorrow's window for the machine's local timezone
pub fn tomorrow_window_local() -> Result<ForecastWindow> {
    tomorrow_window(&Local::now())
}

fn tomorrow<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<chrono::NaiveDate> {
    now.date_naive()
        .succ_opt()
        .ok_or_else(|| ProcessingError::TimeWindow(format!("no day after {}", now.date_naive())))
}

fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    // DST transitions: ambiguous times take the earlier instant, skipped times fail
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            ProcessingError::TimeWindow(format!("{} does not exist in the local timezone", naive))
        })
}
