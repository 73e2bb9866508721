use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short-code-to-target-URL association with lifecycle metadata.
///
/// Exactly one of `permanent` and a set `expires_at` holds; a mapping
/// created with neither receives a default 7-day expiry. Timestamps are
/// stored in the fixed formats of [`crate::timefmt`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mapping {
    pub code: String,
    pub target: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub permanent: bool,
    pub owner: Option<String>,
}

/// One recorded redirect event with derived client metadata.
///
/// Visit records are written once and never mutated; they are deleted in
/// bulk when their owning mapping goes away.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitRecord {
    pub id: i64,
    pub code: String,
    pub entry_time: String,
    pub response_time: String,
    pub platform: String,
    pub browser: String,
    pub client_ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    pub distance: String,
}

/// A visit record before insertion (no row id yet).
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub code: String,
    pub entry_time: String,
    pub response_time: String,
    pub platform: String,
    pub browser: String,
    pub client_ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    pub distance: String,
}

/// A creating principal. The auth layer lives outside this crate; the core
/// only provisions the table and treats `Mapping::owner` as an opaque key
/// into it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub api_token: Option<String>,
}
