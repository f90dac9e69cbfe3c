// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Periodic retention sweep.
//!
//! Removes IP log entries past the retention horizon, submissions already
//! marked read, and idle admission locks.

use crate::clock::Clock;
use crate::config::CleanupConfig;
use crate::error::StoreError;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::store::{IpSubmissionLog, SubmissionStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub ip_entries: usize,
    pub read_submissions: usize,
    pub idle_locks: usize,
}

pub struct CleanupSweep {
    config: CleanupConfig,
    log: Arc<dyn IpSubmissionLog>,
    store: Arc<dyn SubmissionStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl CleanupSweep {
    pub fn new(
        config: CleanupConfig,
        log: Arc<dyn IpSubmissionLog>,
        store: Arc<dyn SubmissionStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            log,
            store,
            limiter,
            clock,
            metrics,
        }
    }

    pub async fn run_once(&self) -> Result<CleanupReport, StoreError> {
        let threshold = self
            .clock
            .now()
            .checked_sub_signed(self.config.retention())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let ip_entries = self.log.delete_before(threshold).await?;
        let read_submissions = self.store.delete_read().await?;
        let idle_locks = self.limiter.prune_locks();

        self.metrics.cleanup_deleted("ip_entries", ip_entries);
        self.metrics.cleanup_deleted("read_submissions", read_submissions);

        info!(
            ip_entries,
            read_submissions,
            idle_locks,
            days_old = self.config.days_old,
            "Cleanup sweep finished"
        );

        Ok(CleanupReport {
            ip_entries,
            read_submissions,
            idle_locks,
        })
    }

    /// Run the sweep on a fixed interval until the runtime shuts down.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once().await {
                    error!(error = %err, "Cleanup sweep failed");
                }
            }
        })
    }
}
