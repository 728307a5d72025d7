pub mod error_aggregator;
pub mod forecast_resolver;
pub mod log_pipeline;

pub use error_aggregator::{ErrorAggregator, ErrorRecord};
pub use forecast_resolver::ForecastResolver;
pub use log_pipeline::{LogPipeline, ResultSet};
