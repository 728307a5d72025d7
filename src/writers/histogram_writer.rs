use crate::error::Result;
use crate::models::HistogramBucket;
use crate::utils::constants::{HISTOGRAM_DELIMITER, HISTOGRAM_HEADER};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes histogram buckets as a delimited table with a header row.
///
/// Bounds are written with two decimals, counts as integers.
pub struct HistogramWriter {
    delimiter: u8,
    precision: usize,
}

impl HistogramWriter {
    pub fn new() -> Self {
        Self {
            delimiter: HISTOGRAM_DELIMITER,
            precision: 2,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Create or truncate `path` and write all buckets to it
    pub fn write(&self, buckets: &[HistogramBucket], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(buckets, file)?;

        tracing::info!(
            "Wrote {} histogram buckets to {}",
            buckets.len(),
            path.display()
        );
        Ok(())
    }

    pub fn write_to<W: Write>(&self, buckets: &[HistogramBucket], writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        csv_writer.write_record(HISTOGRAM_HEADER)?;
        for bucket in buckets {
            csv_writer.write_record(&[
                format!("{:.*}", self.precision, bucket.min),
                format!("{:.*}", self.precision, bucket.max),
                bucket.count.to_string(),
            ])?;
        }
        csv_writer.flush()?;

        Ok(())
    }
}

impl Default for HistogramWriter {
    fn default() -> Self {
        Self::new()
    }
}
