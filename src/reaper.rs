//! Background expiration reaper.
//!
//! A fixed-interval sweep that purges mappings whose expiry has passed,
//! together with their visit records. The interval fires unconditionally
//! with no drift correction; if a sweep overruns, the next one follows
//! immediately after it completes, and at most one sweep is ever in
//! flight. Deletions are committed per record, which keeps the sweep
//! idempotent: a crash mid-sweep is resumed by the next cycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::storage::Storage;
use crate::timefmt;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExpirationReaper {
    storage: Arc<dyn Storage>,
    interval: Duration,
}

impl ExpirationReaper {
    pub fn new(storage: Arc<dyn Storage>, interval: Duration) -> Self {
        Self { storage, interval }
    }

    /// Run the Idle/Sweeping loop until the shutdown signal flips.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        // Skip the first tick which fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => debug!("sweep found nothing expired"),
                        Ok(n) => info!(reaped = n, "purged expired mappings"),
                        Err(e) => error!(error = %e, "failed to scan for expired mappings"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("expiration reaper shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One sweep: find every mapping whose expiry has passed and cascade
    /// delete its visits, then the mapping itself. A fault on one candidate
    /// is logged and skipped; the next cycle retries it. Returns the number
    /// of mappings reaped.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let now = timefmt::now();
        let candidates = self.storage.expirable_mappings().await?;

        let mut reaped = 0;
        for mapping in candidates {
            // Permanent rows and rows without an expiry never show up here,
            // but the expiry still has to be parsed before comparing.
            let Some(raw) = mapping.expires_at.as_deref() else {
                continue;
            };
            let expires_at = match timefmt::parse_expiry(raw) {
                Ok(t) => t,
                Err(_) => {
                    warn!(code = %mapping.code, expires_at = %raw, "unparseable expiry, skipping");
                    continue;
                }
            };
            if expires_at > now {
                continue;
            }

            // Visits first, then the mapping, each statement its own commit.
            // An orphan visit row would corrupt aggregate counts for a code
            // that later gets reallocated, so the mapping only goes away
            // once its visits are gone.
            if let Err(e) = self.storage.delete_visits(&mapping.code).await {
                warn!(code = %mapping.code, error = %e, "failed to delete visits, will retry next sweep");
                continue;
            }
            match self.storage.delete_mapping(&mapping.code).await {
                Ok(true) => {
                    debug!(code = %mapping.code, "reaped expired mapping");
                    reaped += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(code = %mapping.code, error = %e, "failed to delete mapping, will retry next sweep");
                }
            }
        }

        Ok(reaped)
    }
}
