pub mod allocator;
pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod reaper;
pub mod storage;
pub mod timefmt;

pub use allocator::CodeAllocator;
pub use analytics::{AnalyticsAggregator, AnalyticsCollector, GeoResolver};
pub use error::Error;
pub use reaper::ExpirationReaper;
