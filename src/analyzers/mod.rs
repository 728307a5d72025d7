pub mod histogram;

pub use histogram::HistogramBuilder;
