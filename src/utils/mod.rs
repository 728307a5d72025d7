pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;
pub mod time;

pub use constants::*;
pub use coordinates::{quantize, CoordinateQuantizer};
pub use filename::generate_default_histogram_filename;
pub use progress::ProgressReporter;
pub use time::{tomorrow_window, tomorrow_window_local};
