//! Visit collection: one record appended per redirect.

use anyhow::Result;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::analytics::geo::{distance_km, GeoLocation, GeoResolver};
use crate::analytics::user_agent;
use crate::models::NewVisit;
use crate::storage::Storage;
use crate::timefmt;

/// Sentinel stored for city/region/country when geolocation is unavailable.
const UNKNOWN_PLACE: &str = "Unknown";

/// Pick the client IP, preferring a forwarded-for header over the raw peer
/// address so front-end proxies do not mask the real client. The first
/// parseable address in the list is the originating client.
pub fn client_ip(forwarded_for: Option<&str>, peer: IpAddr) -> IpAddr {
    if let Some(raw) = forwarded_for {
        for part in raw.split(',') {
            if let Ok(ip) = part.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    peer
}

pub struct AnalyticsCollector {
    storage: Arc<dyn Storage>,
    geo: GeoResolver,
    /// Server-side location, resolved once at construction; the baseline
    /// for client distance.
    server_location: GeoLocation,
}

impl AnalyticsCollector {
    pub fn new(storage: Arc<dyn Storage>, geo: GeoResolver, server_ip: Option<IpAddr>) -> Self {
        let server_location = server_ip.map(|ip| geo.lookup(ip)).unwrap_or_default();
        Self {
            storage,
            geo,
            server_location,
        }
    }

    /// Append one visit record for a redirect of `code`.
    ///
    /// User-agent classification and geolocation each degrade independently
    /// (sentinel values) rather than failing the call; only storage
    /// unavailability propagates.
    pub async fn track(
        &self,
        code: &str,
        user_agent: &str,
        client_ip: IpAddr,
        response_time_secs: f64,
    ) -> Result<()> {
        let agent = user_agent::classify(user_agent);

        let location = self.geo.lookup(client_ip);
        if location.is_unknown() {
            debug!(ip = %client_ip, "no geolocation for visitor, recording sentinel row");
        }

        let distance = match (location.coords(), self.server_location.coords()) {
            (Some(client), Some(server)) => distance_km(client, server),
            _ => 0.0,
        };

        let visit = NewVisit {
            code: code.to_string(),
            entry_time: timefmt::format_entry(timefmt::now()),
            response_time: response_time_secs.to_string(),
            platform: agent.platform,
            browser: agent.browser,
            client_ip: client_ip.to_string(),
            city: location.city.unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            region: location.region.unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            country: location.country.unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
            latitude: location
                .latitude
                .map(|v| v.to_string())
                .unwrap_or_default(),
            longitude: location
                .longitude
                .map(|v| v.to_string())
                .unwrap_or_default(),
            distance: format!("{:.10}", distance),
        };

        self.storage.insert_visit(&visit).await
    }

    /// Total number of recorded visits for a code.
    pub async fn entry_count(&self, code: &str) -> Result<i64> {
        self.storage.visit_count(code).await
    }

    /// Number of distinct client IPs that visited a code.
    pub async fn unique_visitor_count(&self, code: &str) -> Result<i64> {
        self.storage.unique_visitor_count(code).await
    }

    /// Remove every visit record for a code, returning how many went away.
    pub async fn delete_all(&self, code: &str) -> Result<u64> {
        self.storage.delete_visits(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(
            client_ip(Some("203.0.113.7"), peer),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn first_address_in_forwarded_chain_wins() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(
            client_ip(Some("203.0.113.7, 198.51.100.1"), peer),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn unparseable_header_falls_back_to_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(client_ip(Some("unknown"), peer), peer);
        assert_eq!(client_ip(None, peer), peer);
    }
}
