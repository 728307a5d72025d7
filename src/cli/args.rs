use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::constants::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "weather-log-processor")]
#[command(about = "Forecast temperature histogram for the clients in a web server log")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short,
        long,
        global = true,
        default_value = DEFAULT_CONFIG_FILE,
        help = "Configuration file (JSON)"
    )]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve tomorrow's maximum temperature for every log row and write a histogram
    Process {
        #[arg(short, long, help = "Tab-separated input log file")]
        input_file: PathBuf,

        #[arg(
            short,
            long,
            help = "Output histogram file path [default: output/forecast-histogram-{YYMMDD}.tsv]"
        )]
        output_file: Option<PathBuf>,

        #[arg(
            short = 'H',
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
            help = "Number of histogram buckets"
        )]
        histogram_buckets: usize,

        #[arg(long, default_value = "false", help = "Flush the forecast cache first")]
        flush_cache: bool,

        #[arg(long, help = "Concurrent row workers [default: from config]")]
        max_workers: Option<usize>,
    },

    /// Remove every entry from the forecast cache
    FlushCache,

    /// Resolve a single IP address to tomorrow's forecast maximum
    Lookup {
        #[arg(long)]
        ip: String,
    },
}
