pub mod config;
pub mod factory;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use tokio::time::{interval_at, Instant};

use crate::time::current_timestamp;

use super::db::Database;

/// Periodically deletes sessions older than the token expiry.
pub struct Recycler {
    db: Arc<Database>,
    interval_secs: u64,
    expiry: u64,
}

impl Recycler {
    pub fn new(db: Arc<Database>, interval_secs: u64, expiry: u64) -> Self {
        Self {
            db,
            interval_secs,
            expiry,
        }
    }

    pub fn start(self) {
        tokio::spawn(async move {
            self.main_loop().await;
        });
    }

    async fn main_loop(&self) {
        let mut intv = interval_at(Instant::now(), Duration::from_secs(self.interval_secs));

        info!(
            "Starting recycling expired sessions, interval: {}s",
            self.interval_secs
        );
        loop {
            intv.tick().await;

            match self.recycle(current_timestamp()) {
                Ok(0) => debug!("No expired session to recycle"),
                Ok(count) => info!("Recycled {count} expired sessions"),
                Err(e) => error!("Failed to recycle sessions: {e:#}"),
            }
        }
    }

    fn recycle(&self, now: u64) -> Result<usize> {
        let before = now.saturating_sub(self.expiry);
        self.db
            .with_transaction(|tx| tx.delete_sessions_before(before))
    }
}
