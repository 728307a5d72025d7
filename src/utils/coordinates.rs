use crate::error::{ProcessingError, Result};
use crate::models::{GeoPoint, QuantizedPoint};

const GRID_SCALE: f64 = 1e9;
/// Finer grids keep the raw product; trimming to `GRID_SCALE` could move them off-grid
const MIN_TRIMMED_PRECISION: f64 = 1e-6;

/// Round `value` half away from zero to the nearest multiple of `precision`.
///
/// `precision` must be positive; [`CoordinateQuantizer::new`] enforces that for callers
/// that take it from configuration.
///
/// # Examples
/// ```
/// use weather_log_processor::utils::quantize;
///
/// assert_eq!(quantize(2.5, 1.0), 3.0);
/// assert_eq!(quantize(-2.5, 1.0), -3.0);
/// assert_eq!(quantize(51.5074, 0.5), 51.5);
/// ```
pub fn quantize(value: f64, precision: f64) -> f64 {
    let snapped = (value / precision).round() * precision;
    // Drop multiplication noise so 1512 * 0.1 is 151.2, not 151.20000000000002
    let snapped = if precision >= MIN_TRIMMED_PRECISION {
        (snapped * GRID_SCALE).round() / GRID_SCALE
    } else {
        snapped
    };

    // -0.0 would render as "-0" in cache keys
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

/// Snaps coordinates onto a fixed grid so nearby locations share a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateQuantizer {
    precision: f64,
}

impl CoordinateQuantizer {
    pub fn new(precision: f64) -> Result<Self> {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(ProcessingError::InvalidCoordinate(format!(
                "Quantization precision must be a positive number, got: {}",
                precision
            )));
        }

        Ok(Self { precision })
    }

    pub fn quantize(&self, value: f64) -> f64 {
        quantize(value, self.precision)
    }

    /// Latitude and longitude are snapped independently
    pub fn quantize_point(&self, point: &GeoPoint) -> QuantizedPoint {
        QuantizedPoint {
            latitude: self.quantize(point.latitude),
            longitude: self.quantize(point.longitude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize(2.5, 1.0), 3.0);
        assert_eq!(quantize(-2.5, 1.0), -3.0);
        assert_eq!(quantize(2.4, 1.0), 2.0);
        assert_eq!(quantize(-2.4, 1.0), -2.0);
    }

    #[test]
    fn test_quantize_small_negative_rounds_to_zero() {
        assert_eq!(quantize(-0.1, 1.0), 0.0);
        assert!(quantize(-0.3, 1.0).is_sign_positive());
    }

    #[test]
    fn test_quantize_is_idempotent() {
        let precisions = [0.01, 0.1, 0.25, 0.5, 1.0, 2.0];
        let values = [-179.99, -33.8688, -0.1278, 0.0, 0.049, 51.5074, 89.95, 151.2093];

        for &p in &precisions {
            for &v in &values {
                let once = quantize(v, p);
                assert_eq!(quantize(once, p), once, "value {} precision {}", v, p);
            }
        }
    }

    #[test]
    fn test_quantized_values_print_cleanly() {
        assert_eq!(quantize(151.2093, 0.1).to_string(), "151.2");
        assert_eq!(quantize(-33.8688, 0.1).to_string(), "-33.9");
        assert_eq!(quantize(0.29, 0.1).to_string(), "0.3");
    }

    #[test]
    fn test_sub_nanodegree_precision_stays_on_grid() {
        let precision = 1e-12;
        let value = 1.234567890123456e-3;

        let snapped = quantize(value, precision);
        assert_eq!(snapped, (value / precision).round() * precision);
        assert!((snapped - value).abs() <= precision / 2.0);
    }

    #[test]
    fn test_nearby_points_share_a_cell() {
        let quantizer = CoordinateQuantizer::new(0.1).unwrap();
        let a = quantizer.quantize_point(&GeoPoint::new(51.5074, -0.1278));
        let b = quantizer.quantize_point(&GeoPoint::new(51.4891, -0.0911));
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantizer_rejects_non_positive_precision() {
        assert!(CoordinateQuantizer::new(0.0).is_err());
        assert!(CoordinateQuantizer::new(-0.5).is_err());
        assert!(CoordinateQuantizer::new(f64::NAN).is_err());
        assert!(CoordinateQuantizer::new(0.5).is_ok());
    }
}
