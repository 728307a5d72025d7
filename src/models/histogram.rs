use serde::{Deserialize, Serialize};

/// One contiguous temperature range of the output histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl HistogramBucket {
    pub fn new(min: f64, max: f64, count: usize) -> Self {
        Self { min, max, count }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}
