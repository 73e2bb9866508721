//! IP geolocation via MaxMind MMDB, plus great-circle distance.
//!
//! Lookups are pure and stateless; a missing database or an unknown IP
//! yields the sentinel unknown location rather than an error, so tracking
//! never blocks a redirect on geolocation.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Mean earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Geographic location derived from an IP address. All fields are optional;
/// a fully-empty value is the "unknown location" sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// Coordinates when both are known.
    pub fn coords(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn is_unknown(&self) -> bool {
        self.city.is_none() && self.country.is_none() && self.coords().is_none()
    }
}

/// GeoIP lookup service backed by a memory-mapped MaxMind City database.
pub struct GeoResolver {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoResolver {
    /// Open a City MMDB at `city_path`. With `None` the resolver is still
    /// usable and every lookup degrades to the unknown sentinel.
    pub fn new(city_path: Option<&str>) -> Result<Self> {
        let reader = if let Some(path) = city_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self { reader })
    }

    /// Resolve an IP address to a location. Never fails; unknown IPs and a
    /// missing database both return the sentinel.
    pub fn lookup(&self, ip: IpAddr) -> GeoLocation {
        let mut location = GeoLocation::default();

        if let Some(ref reader) = self.reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                    location.country = city.country.names.english.map(|s| s.to_string());
                    if let Some(subdivision) = city.subdivisions.first() {
                        location.region = subdivision.names.english.map(|s| s.to_string());
                    }
                    location.city = city.city.names.english.map(|s| s.to_string());
                    location.latitude = city.location.latitude;
                    location.longitude = city.location.longitude;
                }
            }
        }

        location
    }
}

// Implement Clone by cloning the Arc
impl Clone for GeoResolver {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
        }
    }
}

/// Great-circle distance in kilometers between two (latitude, longitude)
/// pairs, by the haversine formula.
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_creation_invalid_path() {
        assert!(GeoResolver::new(Some("/nonexistent/path.mmdb")).is_err());
    }

    #[test]
    fn resolver_without_database_degrades_to_unknown() {
        let resolver = GeoResolver::new(None).unwrap();
        let location = resolver.lookup("203.0.113.7".parse().unwrap());
        assert!(location.is_unknown());
        assert!(location.coords().is_none());
    }

    #[test]
    fn distance_of_identical_points_is_zero() {
        assert!(distance_km((51.5, -0.12), (51.5, -0.12)).abs() < 1e-9);
    }

    #[test]
    fn distance_london_paris_is_about_343_km() {
        let london = (51.5074, -0.1278);
        let paris = (48.8566, 2.3522);
        let d = distance_km(london, paris);
        assert!((330.0..350.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = (40.7128, -74.0060);
        let b = (35.6762, 139.6503);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }
}
