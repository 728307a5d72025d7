use crate::error::{ProcessingError, Result};
use crate::models::HistogramBucket;

/// Partitions sorted temperatures into equal-width buckets.
///
/// Boundaries are cumulative: each bucket's upper bound is the previous one plus the
/// bucket width, so floating-point drift carries through to the last bucket. A value
/// equal to an upper bound belongs to the lower bucket. When a value lies beyond the
/// current bucket, the sweep advances exactly one bucket, so the final bucket can hold
/// values above its nominal maximum.
pub struct HistogramBuilder {
    requested_buckets: usize,
}

impl HistogramBuilder {
    pub fn new(requested_buckets: usize) -> Self {
        Self { requested_buckets }
    }

    /// `sorted_values` must be ascending and non-empty
    pub fn build(&self, sorted_values: &[f64]) -> Result<Vec<HistogramBucket>> {
        if self.requested_buckets == 0 {
            return Err(ProcessingError::Histogram(
                "bucket count must be at least 1".to_string(),
            ));
        }

        let (first, last) = match (sorted_values.first(), sorted_values.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(ProcessingError::Histogram(
                    "no values to bucket".to_string(),
                ))
            }
        };
        debug_assert!(sorted_values.windows(2).all(|w| w[0] <= w[1]));

        let effective_buckets = self.requested_buckets.min(sorted_values.len());
        let bucket_size = (last - first) / effective_buckets as f64;

        let mut buckets = Vec::with_capacity(effective_buckets);
        let mut bucket_min = first;
        let mut bucket_max = first + bucket_size;
        let mut count = 0;

        for &value in sorted_values {
            if value <= bucket_max {
                count += 1;
            } else {
                buckets.push(HistogramBucket::new(bucket_min, bucket_max, count));
                count = 1;
                bucket_min = bucket_max;
                bucket_max += bucket_size;
            }
        }
        buckets.push(HistogramBucket::new(bucket_min, bucket_max, count));

        Ok(buckets)
    }
}
