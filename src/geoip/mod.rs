//! IP address to location resolution.

mod maxmind;

pub use maxmind::MaxMindGeoIp;

use crate::error::RowError;
use crate::models::GeoPoint;

/// Maps an IP address to coordinates.
///
/// `Ok(None)` means the address is well-formed but has no location entry; malformed
/// addresses and database faults are errors. Lookups are local and synchronous.
pub trait GeoIpLookup: Send + Sync {
    fn lookup(&self, ip: &str) -> std::result::Result<Option<GeoPoint>, RowError>;
}
