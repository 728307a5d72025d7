pub mod forecast;
pub mod geo;
pub mod histogram;
pub mod log_row;

pub use forecast::{ForecastKey, ForecastWindow};
pub use geo::{GeoPoint, QuantizedPoint};
pub use histogram::HistogramBucket;
pub use log_row::LogRow;
