//! Per-visit analytics: geolocation, user-agent classification, visit
//! collection, and on-demand aggregation.
//!
//! Everything here sits on the non-critical path of a redirect: a failed
//! geolocation lookup degrades to a sentinel "unknown location" row, and
//! only storage unavailability propagates to the caller.

pub mod aggregator;
pub mod collector;
pub mod geo;
pub mod user_agent;

pub use aggregator::{AnalyticsAggregator, CategoryCount, VisitSummary};
pub use collector::{client_ip, AnalyticsCollector};
pub use geo::{distance_km, GeoLocation, GeoResolver};
pub use user_agent::{classify, ClassifiedAgent};
