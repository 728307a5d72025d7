pub mod histogram_writer;

pub use histogram_writer::HistogramWriter;
