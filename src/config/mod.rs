use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub reaper: ReaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Path to a MaxMind City .mmdb file; without it every lookup degrades
    /// to the unknown-location sentinel.
    pub geoip_db_path: Option<String>,
    /// Public IP of this server, the baseline for client distance.
    pub server_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./curt.db".to_string());

        let max_connections = std::env::var("MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let geoip_db_path = std::env::var("GEOIP_DB_PATH").ok();

        let server_ip = match std::env::var("SERVER_IP") {
            Ok(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::warn!(
                        "SERVER_IP '{raw}' is not a valid IP address, distance tracking disabled"
                    );
                    None
                }
            },
            Err(_) => None,
        };

        let sweep_interval_secs = match std::env::var("SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!("SWEEP_INTERVAL_SECS '{raw}' is not a number, using 60");
                60
            }),
            Err(_) => 60,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            analytics: AnalyticsConfig {
                geoip_db_path,
                server_ip,
            },
            reaper: ReaperConfig {
                sweep_interval_secs,
            },
        })
    }
}
