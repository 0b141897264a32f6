//! Pool alert notification logic.

use crate::db::{DbError, SettingsStore};
use crate::telegram::TelegramError;
use async_trait::async_trait;
use poolwatch_core::Pool;
use poolwatch_engine::SnapshotTracker;
use poolwatch_feeds::PoolSource;
use std::sync::Arc;
use teloxide::utils::html;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Destination for formatted alert messages.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, chat_id: i64, message: &str) -> Result<(), TelegramError>;
}

/// Result of one fetch/filter/diff/notify cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Listing unavailable or empty; snapshot untouched, nothing sent.
    Skipped,
    Checked {
        /// Pools passing the user's thresholds.
        matched: usize,
        /// Pools not in the previous snapshot.
        new: usize,
        /// Alerts actually delivered.
        sent: u32,
    },
}

/// Tracks new pools per user and sends one alert per new pool.
pub struct Notifier {
    source: Arc<dyn PoolSource>,
    store: Arc<dyn SettingsStore>,
    sink: Arc<dyn AlertSink>,
    tracker: SnapshotTracker,
    cycle_lock: Mutex<()>,
}

impl Notifier {
    /// Create a new notifier.
    pub fn new(
        source: Arc<dyn PoolSource>,
        store: Arc<dyn SettingsStore>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            tracker: SnapshotTracker::new(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn tracker(&self) -> &SnapshotTracker {
        &self.tracker
    }

    /// Send one alert for one pool.
    pub async fn notify(&self, user_id: i64, pool: &Pool) -> Result<(), TelegramError> {
        let message = format_pool_message(pool);
        self.sink.send_alert(user_id, &message).await
    }

    /// Send alerts in order. A failed send is logged and does not stop the rest.
    pub async fn notify_all(&self, user_id: i64, pools: &[Pool]) -> u32 {
        let mut sent_count = 0u32;

        for pool in pools {
            match self.notify(user_id, pool).await {
                Ok(()) => {
                    info!(user_id = user_id, pool = pool.label(), "Alert sent");
                    sent_count += 1;
                }
                Err(e) => {
                    error!(
                        user_id = user_id,
                        pool = pool.label(),
                        error = %e,
                        "Failed to send alert"
                    );
                }
            }
        }

        sent_count
    }

    /// Fetch the listing, apply the user's thresholds, and alert on pools not
    /// seen in that user's previous snapshot. One cycle runs at a time.
    pub async fn track_new_pools(&self, user_id: i64) -> Result<CycleReport, NotifierError> {
        let _guard = self.cycle_lock.lock().await;

        let pools = match self.source.fetch_all().await {
            Some(pools) if !pools.is_empty() => pools,
            Some(_) => {
                debug!(user_id = user_id, "Pool listing empty, skipping cycle");
                return Ok(CycleReport::Skipped);
            }
            None => {
                warn!(user_id = user_id, "No pool listing, skipping cycle");
                return Ok(CycleReport::Skipped);
            }
        };

        let settings = self.store.get(user_id).await?;
        let new_pools = self.tracker.check(user_id, &pools, settings.as_ref());
        let matched = self.tracker.snapshot(user_id).map_or(0, |s| s.len());

        let sent = self.notify_all(user_id, &new_pools).await;
        if !new_pools.is_empty() {
            info!(
                user_id = user_id,
                matched = matched,
                new = new_pools.len(),
                sent = sent,
                "Pool check complete"
            );
        }

        Ok(CycleReport::Checked {
            matched,
            new: new_pools.len(),
            sent,
        })
    }
}

fn or_na<T>(value: Option<T>, render: impl FnOnce(T) -> String) -> String {
    value.map(render).unwrap_or_else(|| "N/A".to_string())
}

fn text_or_na(value: Option<&str>) -> String {
    or_na(value.filter(|s| !s.is_empty()), html::escape)
}

/// Format a dollar amount with a magnitude suffix.
pub fn format_usd(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else {
        format!("${:.2}", value)
    }
}

/// Format a pool as an alert message. Missing fields render as `N/A`.
pub fn format_pool_message(pool: &Pool) -> String {
    let mut msg = format!(
        "🆕 <b>New Pool</b>\n\n\
         <b>Pair:</b> {}\n\
         <b>Address:</b> <code>{}</code>\n\
         <b>Token:</b> <code>{}</code>\n\
         <b>Age:</b> {}\n\
         <b>Market Cap:</b> {}\n\
         <b>TVL:</b> {}\n\
         <b>Volume:</b> {}\n\
         <b>Bin Step:</b> {}\n\
         <b>Fees:</b> {}\n\
         <b>Dynamic Fee:</b> {}\n\
         <b>Print Rate:</b> {}",
        text_or_na(pool.pair_name.as_deref()),
        text_or_na(pool.address.as_deref()),
        text_or_na(pool.token_address.as_deref()),
        text_or_na(pool.age.as_deref()),
        or_na(pool.market_cap, format_usd),
        or_na(pool.tvl, format_usd),
        or_na(pool.volume, format_usd),
        or_na(pool.bin_step, |v| v.to_string()),
        or_na(pool.fees, |v| format!("{:.2}", v)),
        or_na(pool.dynamic_fee, |v| format!("{:.2}", v)),
        or_na(pool.print_rate, |v| format!("{:.2}", v)),
    );

    let now = chrono::Utc::now();
    msg.push_str(&format!("\n\n⏰ {}", now.format("%Y-%m-%d %H:%M:%S UTC")));

    msg
}
