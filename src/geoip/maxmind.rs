use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{Result, RowError};
use crate::geoip::GeoIpLookup;
use crate::models::GeoPoint;

/// GeoIP lookups against a MaxMind City database (`.mmdb`), loaded fully into memory.
pub struct MaxMindGeoIp {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeoIp {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        info!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            "Opened GeoIP database"
        );
        Ok(Self { reader })
    }
}

impl GeoIpLookup for MaxMindGeoIp {
    fn lookup(&self, ip: &str) -> std::result::Result<Option<GeoPoint>, RowError> {
        let address: IpAddr = ip
            .parse()
            .map_err(|_| RowError::InvalidIpAddress(ip.to_string()))?;

        let city: geoip2::City = match self.reader.lookup(address) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(RowError::GeoIpLookup(e.to_string())),
        };

        let point = city
            .location
            .and_then(|location| Some(GeoPoint::new(location.latitude?, location.longitude?)));

        Ok(point.and_then(|p| in_range(ip, p)))
    }
}

/// Database entries outside the valid coordinate ranges are treated as misses
fn in_range(ip: &str, point: GeoPoint) -> Option<GeoPoint> {
    if point.validate().is_ok() {
        return Some(point);
    }
    debug!(
        ip,
        latitude = point.latitude,
        longitude = point.longitude,
        "Discarding out-of-range GeoIP location"
    );
    None
}
