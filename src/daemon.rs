//! Background maintenance loop.
//!
//! Periodically prunes aged items and, when enabled, refreshes every feed
//! first. Runs in the foreground until interrupted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use crate::app::{AppContext, Result, StoreError};
use crate::store::{PruneReport, Store};

/// Longest accepted interval (one year).
const MAX_INTERVAL_SECS: u64 = 366 * 86400;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Interval between runs in seconds (default: 86400 = 1 day)
    pub interval_secs: u64,
    /// Whether to run immediately on start
    pub run_on_start: bool,
    /// Refresh feeds before pruning
    pub refresh: bool,
    /// Pruning window in days
    pub prune_days: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86400,
            run_on_start: true,
            refresh: false,
            prune_days: crate::store::DEFAULT_RETENTION_DAYS,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let (number, unit, multiplier) = if let Some(hours) = s.strip_suffix('h') {
            (hours, "hours", 3600)
        } else if let Some(minutes) = s.strip_suffix('m') {
            (minutes, "minutes", 60)
        } else if let Some(days) = s.strip_suffix('d') {
            (days, "days", 86400)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, "seconds", 1)
        } else {
            (s.as_str(), "interval", 1)
        };

        let secs = number
            .parse::<u64>()
            .map_err(|_| format!("Invalid {}: {}. Use format like '1h', '30m', '1d'", unit, number))?
            .checked_mul(multiplier)
            .filter(|secs| *secs <= MAX_INTERVAL_SECS)
            .ok_or_else(|| format!("Interval too long: {}", s))?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Outcome of one maintenance run.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub new_items: usize,
    pub refresh_errors: usize,
    pub prune: PruneReport,
}

pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            "Maintenance daemon started (interval: {}, PID: {})",
            DaemonConfig::format_interval(self.config.interval_secs),
            std::process::id()
        );

        if self.config.run_on_start {
            self.run_cycle().await;
        }

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal.map_err(|e| StoreError::Other(format!("Failed to listen for shutdown: {}", e)))?;
                    break;
                }
                _ = timer.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        tracing::info!("Daemon shutting down");
        Ok(())
    }

    /// Run a single maintenance cycle
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Utc::now();
        let mut report = CycleReport::default();

        if self.config.refresh {
            let summary = self
                .ctx
                .refresher
                .refresh_all(self.ctx.store.clone(), &self.ctx.normalizer)
                .await;
            for (feed_id, e) in &summary.errors {
                tracing::warn!("Error updating {}: {}", feed_id, e);
            }
            report.new_items = summary.new_items;
            report.refresh_errors = summary.errors.len();
        }

        report.prune = self.ctx.store.prune_all(self.config.prune_days);

        let elapsed = Utc::now().signed_duration_since(start);
        tracing::info!(
            "Maintenance complete: {} new items, {} refresh errors, {} items pruned, {} files skipped ({:.1}s)",
            report.new_items,
            report.refresh_errors,
            report.prune.removed_count,
            report.prune.failed_files.len(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        report
    }
}
