use crate::models::{Mapping, NewVisit, VisitRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence boundary shared by the request path and the reaper.
///
/// This is the sole point of synchronization between the two: all
/// cross-component coordination happens through committed rows, never
/// through in-process shared state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Insert a new mapping. A uniqueness violation on `code` is reported
    /// as [`StorageError::Conflict`] so the allocator can redraw.
    async fn insert_mapping(&self, mapping: &Mapping) -> StorageResult<()>;

    /// Get a mapping by short code.
    async fn get_mapping(&self, code: &str) -> Result<Option<Mapping>>;

    /// Total number of mappings; drives generated code length.
    async fn mapping_count(&self) -> Result<i64>;

    /// Whether a short code is already taken.
    async fn code_exists(&self, code: &str) -> Result<bool>;

    /// Overwrite the expiry of a mapping, clearing the permanent flag.
    /// Returns false when the code is unknown.
    async fn set_expiry(&self, code: &str, expires_at: &str) -> Result<bool>;

    /// Mark a mapping permanent, clearing any expiry.
    async fn set_permanent(&self, code: &str) -> Result<bool>;

    /// Delete a mapping row only; visit cleanup is the caller's concern.
    async fn delete_mapping(&self, code: &str) -> Result<bool>;

    /// All mappings that carry an expiry (non-permanent, `expires_at` set).
    /// Expiry comparison is done by the caller on parsed timestamps.
    async fn expirable_mappings(&self) -> Result<Vec<Mapping>>;

    /// All mappings created by one owner, in unspecified order.
    async fn mappings_for_owner(&self, owner: &str) -> Result<Vec<Mapping>>;

    /// Append one visit record.
    async fn insert_visit(&self, visit: &NewVisit) -> Result<()>;

    /// All visit records for a code, in stable insertion order.
    async fn visits_for(&self, code: &str) -> Result<Vec<VisitRecord>>;

    /// Number of visit records for a code.
    async fn visit_count(&self, code: &str) -> Result<i64>;

    /// Number of distinct client IPs that visited a code.
    async fn unique_visitor_count(&self, code: &str) -> Result<i64>;

    /// Delete every visit record for a code, returning how many went away.
    async fn delete_visits(&self, code: &str) -> Result<u64>;
}
