use anyhow::{bail, Context};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analyzers::HistogramBuilder;
use crate::cache::{ForecastCache, InMemoryForecastCache, RedisForecastCache};
use crate::cli::args::{Cli, Commands};
use crate::config::{AppConfig, CacheBackend, CacheConfig};
use crate::error::{ProcessingError, RowError};
use crate::forecast::OpenWeatherMapClient;
use crate::geoip::{GeoIpLookup, MaxMindGeoIp};
use crate::processors::{ErrorAggregator, ForecastResolver, LogPipeline};
use crate::readers::LogReader;
use crate::utils::progress::ProgressReporter;
use crate::utils::{generate_default_histogram_filename, tomorrow_window_local, CoordinateQuantizer};
use crate::writers::HistogramWriter;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Process {
            input_file,
            output_file,
            histogram_buckets,
            flush_cache,
            max_workers,
        } => {
            let output_file = output_file.unwrap_or_else(generate_default_histogram_filename);
            let max_workers = max_workers.unwrap_or(config.log_processor.max_workers);

            println!("Processing log file...");
            println!("Input file: {}", input_file.display());
            println!("Output file: {}", output_file.display());
            println!(
                "Workers: {}, Histogram buckets: {}",
                max_workers, histogram_buckets
            );

            let geoip = open_geoip(&config)?;
            let quantizer = CoordinateQuantizer::new(config.log_processor.geo_precision)?;
            let cache = connect_cache(&config.cache).await?;

            if flush_cache {
                cache
                    .flush()
                    .await
                    .context("Failed to flush forecast cache")?;
                println!("Forecast cache flushed");
            }

            let resolver = build_resolver(&config, cache)?;
            let window = tomorrow_window_local()?;
            info!(start = %window.start, end = %window.end, "Forecast window");

            let pipeline = LogPipeline::new(geoip, quantizer, Arc::new(resolver), window)
                .with_ip_column(config.log_processor.ip_column)
                .with_max_workers(max_workers);

            let rows = LogReader::new()
                .open(&input_file)
                .with_context(|| format!("Failed to open {}", input_file.display()))?;

            let progress = ProgressReporter::new_row_counter("Resolving forecasts...", false);
            let mut errors = ErrorAggregator::new();
            let outcome = pipeline.process(rows, &mut errors, Some(&progress)).await;

            let results = match outcome {
                Ok(results) => {
                    progress.finish_with_message(&format!(
                        "Resolved {} forecasts",
                        results.len()
                    ));
                    results
                }
                Err(ProcessingError::NoForecasts { lines_processed }) => {
                    progress.finish_with_message("No forecasts resolved");
                    println!("\n{}", errors.generate_summary(lines_processed));
                    return Err(ProcessingError::NoForecasts { lines_processed }.into());
                }
                Err(e) => return Err(e).context("Failed to process log file"),
            };

            let buckets = HistogramBuilder::new(histogram_buckets).build(results.values())?;

            if let Some(parent) = output_file.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            HistogramWriter::new()
                .write(&buckets, &output_file)
                .with_context(|| format!("Failed to write {}", output_file.display()))?;

            println!("\nHistogram Summary:");
            println!("  Buckets: {}", buckets.len());
            if let (Some(min), Some(max)) = (results.min(), results.max()) {
                println!("  Temperatures: {:.2} to {:.2} ({} values)", min, max, results.len());
            }
            println!("  Written to: {}", output_file.display());

            println!("\n{}", errors.generate_summary(results.lines_processed()));
            println!("Processing complete!");
        }

        Commands::FlushCache => {
            let cache = connect_cache(&config.cache).await?;
            cache
                .flush()
                .await
                .context("Failed to flush forecast cache")?;
            println!("Forecast cache flushed");
        }

        Commands::Lookup { ip } => {
            let geoip = open_geoip(&config)?;
            let quantizer = CoordinateQuantizer::new(config.log_processor.geo_precision)?;
            let cache = connect_cache(&config.cache).await?;
            let resolver = build_resolver(&config, cache)?;
            let window = tomorrow_window_local()?;

            let location = match geoip.lookup(ip.trim()) {
                Ok(Some(location)) => location,
                Ok(None) => bail!("{}: {}", ip, RowError::GeoIpMiss),
                Err(e) => bail!("{}", e),
            };
            let point = quantizer.quantize_point(&location);

            let temperature = resolver
                .resolve(&point, &window)
                .await
                .with_context(|| format!("Failed to resolve forecast for {}", point))?;

            println!("IP address: {}", ip);
            println!(
                "Location: ({}, {}) -> grid cell {}",
                location.latitude, location.longitude, point
            );
            println!(
                "Forecast maximum for {}: {:.2}",
                window.forecast_date(),
                temperature
            );
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if verbose {
        "info,weather_log_processor=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let initialised = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    initialised.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

fn open_geoip(config: &AppConfig) -> anyhow::Result<Arc<dyn GeoIpLookup>> {
    let path = PathBuf::from(&config.geoip_db.file);
    let geoip = MaxMindGeoIp::open(&path)
        .with_context(|| format!("Failed to open GeoIP database {}", path.display()))?;
    Ok(Arc::new(geoip))
}

async fn connect_cache(config: &CacheConfig) -> anyhow::Result<Arc<dyn ForecastCache>> {
    match config.backend {
        CacheBackend::Redis => {
            let cache = RedisForecastCache::connect(&config.redis_url())
                .await
                .with_context(|| {
                    format!(
                        "Failed to connect to Redis at {}:{}",
                        config.host, config.port
                    )
                })?;
            info!(host = %config.host, port = config.port, db = config.db, "Connected to Redis");
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            info!("Using in-memory forecast cache");
            Ok(Arc::new(InMemoryForecastCache::new()))
        }
    }
}

fn build_resolver(
    config: &AppConfig,
    cache: Arc<dyn ForecastCache>,
) -> anyhow::Result<ForecastResolver> {
    let timeout = config.log_processor.request_timeout();
    let provider = OpenWeatherMapClient::new(&config.weather_api, timeout)
        .context("Failed to build forecast API client")?;

    Ok(ForecastResolver::new(cache, Arc::new(provider))
        .with_ttl(config.cache.ttl())
        .with_timeout(timeout))
}
