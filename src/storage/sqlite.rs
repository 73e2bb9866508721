use crate::models::{Mapping, NewVisit, VisitRecord};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mappings (
                code TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT,
                permanent INTEGER NOT NULL DEFAULT 0,
                owner TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_owner ON mappings(owner)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_expires ON mappings(expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                response_time TEXT NOT NULL,
                platform TEXT NOT NULL,
                browser TEXT NOT NULL,
                client_ip TEXT NOT NULL,
                city TEXT NOT NULL,
                region TEXT NOT NULL,
                country TEXT NOT NULL,
                latitude TEXT NOT NULL,
                longitude TEXT NOT NULL,
                distance TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_code ON visits(code)")
            .execute(self.pool.as_ref())
            .await?;

        // Consumed opaquely by the external auth layer; the core only needs
        // owner as an opaque foreign key.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS principals (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                api_token TEXT UNIQUE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_mapping(&self, mapping: &Mapping) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO mappings (code, target, created_at, expires_at, permanent, owner)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO NOTHING
            "#,
        )
        .bind(&mapping.code)
        .bind(&mapping.target)
        .bind(&mapping.created_at)
        .bind(&mapping.expires_at)
        .bind(mapping.permanent)
        .bind(&mapping.owner)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(())
    }

    async fn get_mapping(&self, code: &str) -> Result<Option<Mapping>> {
        let mapping = sqlx::query_as::<_, Mapping>(
            r#"
            SELECT code, target, created_at, expires_at, permanent, owner
            FROM mappings
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(mapping)
    }

    async fn mapping_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mappings")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mappings WHERE code = ?")
            .bind(code)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn set_expiry(&self, code: &str, expires_at: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mappings
            SET expires_at = ?, permanent = 0
            WHERE code = ?
            "#,
        )
        .bind(expires_at)
        .bind(code)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_permanent(&self, code: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mappings
            SET permanent = 1, expires_at = NULL
            WHERE code = ?
            "#,
        )
        .bind(code)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_mapping(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mappings WHERE code = ?")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expirable_mappings(&self) -> Result<Vec<Mapping>> {
        let mappings = sqlx::query_as::<_, Mapping>(
            r#"
            SELECT code, target, created_at, expires_at, permanent, owner
            FROM mappings
            WHERE expires_at IS NOT NULL AND permanent = 0
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(mappings)
    }

    async fn mappings_for_owner(&self, owner: &str) -> Result<Vec<Mapping>> {
        let mappings = sqlx::query_as::<_, Mapping>(
            r#"
            SELECT code, target, created_at, expires_at, permanent, owner
            FROM mappings
            WHERE owner = ?
            "#,
        )
        .bind(owner)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(mappings)
    }

    async fn insert_visit(&self, visit: &NewVisit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO visits (
                code, entry_time, response_time, platform, browser,
                client_ip, city, region, country, latitude, longitude, distance
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&visit.code)
        .bind(&visit.entry_time)
        .bind(&visit.response_time)
        .bind(&visit.platform)
        .bind(&visit.browser)
        .bind(&visit.client_ip)
        .bind(&visit.city)
        .bind(&visit.region)
        .bind(&visit.country)
        .bind(&visit.latitude)
        .bind(&visit.longitude)
        .bind(&visit.distance)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn visits_for(&self, code: &str) -> Result<Vec<VisitRecord>> {
        let visits = sqlx::query_as::<_, VisitRecord>(
            r#"
            SELECT id, code, entry_time, response_time, platform, browser,
                   client_ip, city, region, country, latitude, longitude, distance
            FROM visits
            WHERE code = ?
            ORDER BY id
            "#,
        )
        .bind(code)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn visit_count(&self, code: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits WHERE code = ?")
            .bind(code)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn unique_visitor_count(&self, code: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT client_ip) FROM visits WHERE code = ?",
        )
        .bind(code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn delete_visits(&self, code: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM visits WHERE code = ?")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
