use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{ErrorKind, ProcessingError, Result, RowError};
use crate::geoip::GeoIpLookup;
use crate::models::{ForecastWindow, LogRow};
use crate::processors::{ErrorAggregator, ForecastResolver};
use crate::utils::constants::DEFAULT_IP_COLUMN;
use crate::utils::progress::ProgressReporter;
use crate::utils::CoordinateQuantizer;

/// Sorted temperatures from every row that resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    values: Vec<f64>,
    lines_processed: usize,
}

impl ResultSet {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    pub fn min(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Everything a worker needs to resolve one row, shared between tasks.
struct RowResolver {
    geoip: Arc<dyn GeoIpLookup>,
    quantizer: CoordinateQuantizer,
    resolver: Arc<ForecastResolver>,
    window: ForecastWindow,
    ip_column: usize,
}

impl RowResolver {
    async fn resolve(&self, row: &LogRow) -> std::result::Result<f64, RowError> {
        let ip = row.ip_address(self.ip_column)?;
        let location = self.geoip.lookup(ip)?.ok_or(RowError::GeoIpMiss)?;
        let point = self.quantizer.quantize_point(&location);

        debug!(line = row.line_number, ip, %point, "Resolving forecast");
        Ok(self.resolver.resolve(&point, &self.window).await?)
    }
}

struct RowOutcome {
    line_number: usize,
    result: std::result::Result<f64, RowError>,
}

/// Turns log rows into forecast temperatures.
///
/// Rows are resolved concurrently on up to `max_workers` tasks. Outcomes are collected
/// here and applied in line order, so the results and the error report match a
/// sequential pass. The forecast window is fixed when the pipeline is built.
pub struct LogPipeline {
    geoip: Arc<dyn GeoIpLookup>,
    quantizer: CoordinateQuantizer,
    resolver: Arc<ForecastResolver>,
    window: ForecastWindow,
    ip_column: usize,
    max_workers: usize,
}

impl LogPipeline {
    pub fn new(
        geoip: Arc<dyn GeoIpLookup>,
        quantizer: CoordinateQuantizer,
        resolver: Arc<ForecastResolver>,
        window: ForecastWindow,
    ) -> Self {
        Self {
            geoip,
            quantizer,
            resolver,
            window,
            ip_column: DEFAULT_IP_COLUMN,
            max_workers: num_cpus::get(),
        }
    }

    pub fn with_ip_column(mut self, ip_column: usize) -> Self {
        self.ip_column = ip_column;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Resolve every row, recording failures in `errors`.
    ///
    /// Reader errors abort the run. If no row produced a temperature the run fails with
    /// [`ProcessingError::NoForecasts`]; `errors` still holds everything recorded.
    pub async fn process<I>(
        &self,
        rows: I,
        errors: &mut ErrorAggregator,
        progress: Option<&ProgressReporter>,
    ) -> Result<ResultSet>
    where
        I: IntoIterator<Item = Result<LogRow>>,
    {
        let shared = Arc::new(RowResolver {
            geoip: Arc::clone(&self.geoip),
            quantizer: self.quantizer,
            resolver: Arc::clone(&self.resolver),
            window: self.window,
            ip_column: self.ip_column,
        });
        let mut tasks: JoinSet<RowOutcome> = JoinSet::new();
        let mut outcomes = Vec::new();
        let mut lines_processed = 0;

        for row in rows {
            let row = row?;
            lines_processed = lines_processed.max(row.line_number);

            while tasks.len() >= self.max_workers {
                if let Some(joined) = tasks.join_next().await {
                    outcomes.push(joined?);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                }
            }

            let shared = Arc::clone(&shared);
            tasks.spawn(async move {
                let result = shared.resolve(&row).await;
                RowOutcome {
                    line_number: row.line_number,
                    result,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined?);
            if let Some(p) = progress {
                p.increment(1);
            }
        }

        outcomes.sort_by_key(|outcome| outcome.line_number);

        let mut values = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome.result {
                Ok(temperature) => values.push(temperature),
                Err(e) => errors.record(ErrorKind::from(&e), outcome.line_number),
            }
        }

        info!(
            lines = lines_processed,
            resolved = values.len(),
            failed = errors.total_errors(),
            cache_hits = self.resolver.cache_hits(),
            provider_calls = self.resolver.provider_calls(),
            "Finished processing log"
        );

        if values.is_empty() {
            return Err(ProcessingError::NoForecasts { lines_processed });
        }

        values.sort_by(|a, b| a.total_cmp(b));

        Ok(ResultSet {
            values,
            lines_processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryForecastCache;
    use crate::forecast::{ForecastProvider, ProviderError};
    use crate::models::{GeoPoint, QuantizedPoint};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    struct StaticGeoIp(HashMap<&'static str, GeoPoint>);

    impl GeoIpLookup for StaticGeoIp {
        fn lookup(&self, ip: &str) -> std::result::Result<Option<GeoPoint>, RowError> {
            Ok(self.0.get(ip).copied())
        }
    }

    /// Forecast equals the quantized latitude, so results are easy to predict
    struct LatitudeProvider;

    #[async_trait]
    impl ForecastProvider for LatitudeProvider {
        async fn max_temperature(
            &self,
            point: &QuantizedPoint,
            _window: &ForecastWindow,
        ) -> std::result::Result<f64, ProviderError> {
            Ok(point.latitude)
        }
    }

    fn pipeline(workers: usize) -> LogPipeline {
        let geoip = StaticGeoIp(HashMap::from([
            ("10.0.0.1", GeoPoint::new(30.2, 1.0)),
            ("10.0.0.2", GeoPoint::new(10.4, 2.0)),
            ("10.0.0.3", GeoPoint::new(20.0, 3.0)),
        ]));
        let window = ForecastWindow::new(
            Utc.with_ymd_and_hms(2018, 6, 1, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 6, 2, 13, 59, 59).unwrap(),
        )
        .unwrap();
        let resolver = ForecastResolver::new(
            Arc::new(InMemoryForecastCache::new()),
            Arc::new(LatitudeProvider),
        );

        LogPipeline::new(
            Arc::new(geoip),
            CoordinateQuantizer::new(1.0).unwrap(),
            Arc::new(resolver),
            window,
        )
        .with_ip_column(1)
        .with_max_workers(workers)
    }

    fn rows(ips: &[&str]) -> Vec<Result<LogRow>> {
        ips.iter()
            .enumerate()
            .map(|(i, ip)| Ok(LogRow::from_fields(i + 1, ["GET /", ip])))
            .collect()
    }

    #[tokio::test]
    async fn test_results_are_sorted() {
        let mut errors = ErrorAggregator::new();
        let results = pipeline(4)
            .process(rows(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]), &mut errors, None)
            .await
            .unwrap();

        assert_eq!(results.values(), &[10.0, 20.0, 30.0]);
        assert_eq!(results.lines_processed(), 3);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_bad_rows_are_recorded_and_skipped() {
        let mut errors = ErrorAggregator::new();
        let mut input = rows(&["10.0.0.1", "192.0.2.1", "10.0.0.3", "192.0.2.2"]);
        input.push(Ok(LogRow::from_fields(5, ["only-one-field"])));

        let results = pipeline(3).process(input, &mut errors, None).await.unwrap();

        assert_eq!(results.values(), &[20.0, 30.0]);
        assert_eq!(results.lines_processed(), 5);

        let misses = errors.get(&ErrorKind::from("No entry found in geodb")).unwrap();
        assert_eq!(misses.line_numbers, vec![2, 4]);
        assert_eq!(errors.total_errors(), 3);
    }

    #[tokio::test]
    async fn test_no_resolvable_rows_is_fatal() {
        let mut errors = ErrorAggregator::new();
        let result = pipeline(2)
            .process(rows(&["192.0.2.1", "192.0.2.2"]), &mut errors, None)
            .await;

        assert!(matches!(
            result,
            Err(ProcessingError::NoForecasts { lines_processed: 2 })
        ));
        assert_eq!(errors.total_errors(), 2);
    }

    #[tokio::test]
    async fn test_reader_error_aborts() {
        let mut errors = ErrorAggregator::new();
        let mut input = rows(&["10.0.0.1"]);
        input.push(Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated",
        ))));

        let result = pipeline(1).process(input, &mut errors, None).await;
        assert!(matches!(result, Err(ProcessingError::Io(_))));
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_output() {
        let ips: Vec<&str> = ["10.0.0.3", "192.0.2.9", "10.0.0.1", "10.0.0.2"]
            .iter()
            .cycle()
            .take(40)
            .copied()
            .collect();

        let mut sequential_errors = ErrorAggregator::new();
        let sequential = pipeline(1)
            .process(rows(&ips), &mut sequential_errors, None)
            .await
            .unwrap();

        let mut parallel_errors = ErrorAggregator::new();
        let parallel = pipeline(8)
            .process(rows(&ips), &mut parallel_errors, None)
            .await
            .unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(
            sequential_errors.generate_summary(40),
            parallel_errors.generate_summary(40)
        );
    }
}
