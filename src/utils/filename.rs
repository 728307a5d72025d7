use chrono::{Datelike, Local};
use std::path::PathBuf;

/// Generate default histogram filename with format: forecast-histogram-{YYMMDD}.tsv
pub fn generate_default_histogram_filename() -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!("forecast-histogram-{:02}{:02}{:02}.tsv", year, month, day);
    PathBuf::from("output").join(filename)
}
