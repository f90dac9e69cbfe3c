// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-IP admission policy for contact form submissions.
//!
//! Two rules are evaluated against the persisted submission log:
//! 1. Daily cap: at most `max_overall_requests` entries inside the window
//! 2. Cooldown: at least `cooldown_minutes` since the latest entry
//!
//! The daily cap resumes when the *oldest* entry in the window leaves it.
//! This is a fixed-window approximation; a true sliding window may reopen
//! up to one window later when entries cluster.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::StoreError;
use crate::store::{IpSubmissionEntry, IpSubmissionLog};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Reason attached to an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLimitReason {
    /// Request may proceed
    Ok,
    /// Too many submissions inside the window
    DailyCap,
    /// Latest submission is too recent
    Cooldown,
}

impl RateLimitReason {
    /// User-facing sentence the retry hint is appended to.
    pub fn base_message(&self) -> &'static str {
        match self {
            Self::Ok => "Allowed",
            Self::DailyCap => "You have exceeded the daily submission limit.",
            Self::Cooldown => "Please wait before sending another message.",
        }
    }

    /// Short label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::DailyCap => "daily_cap",
            Self::Cooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a rate limit check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub reason: RateLimitReason,
    pub retry_after_secs: Option<i64>,
}

impl RateLimitDecision {
    pub fn allowed() -> Self {
        Self {
            limited: false,
            reason: RateLimitReason::Ok,
            retry_after_secs: None,
        }
    }

    pub fn denied(reason: RateLimitReason, retry_after_secs: Option<i64>) -> Self {
        Self {
            limited: true,
            reason,
            retry_after_secs,
        }
    }
}

/// Admission checks backed by the IP submission log.
///
/// Holds no per-request state of its own; everything lives in the log.
pub struct RateLimiter {
    config: RateLimitConfig,
    log: Arc<dyn IpSubmissionLog>,
    clock: Arc<dyn Clock>,
    locks: AdmissionLocks,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig, log: Arc<dyn IpSubmissionLog>, clock: Arc<dyn Clock>) -> Self {
        info!(
            max_overall_requests = config.max_overall_requests,
            overall_window_minutes = config.overall_window_minutes,
            cooldown_minutes = config.cooldown_minutes,
            "Rate limiter initialised"
        );
        Self {
            config,
            log,
            clock,
            locks: AdmissionLocks::default(),
        }
    }

    /// Evaluate the admission policy for `ip`. Read-only.
    pub async fn check(&self, ip: &str) -> Result<RateLimitDecision, StoreError> {
        let now = self.clock.now();
        let window = self.config.window();
        let window_start = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let recent = self.log.find_after(ip, window_start).await?;
        let count = recent.len() as i64;

        if count >= self.config.max_overall_requests {
            // Empty only when the cap itself is zero or negative.
            let retry_after_secs = oldest(&recent).map(|first| {
                let window_ends = first
                    .submission_time
                    .checked_add_signed(window)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                (window_ends - now).num_seconds().max(0)
            });
            warn!(
                %ip,
                count,
                retry_after_secs = ?retry_after_secs,
                "Rate limited (daily cap)"
            );
            return Ok(RateLimitDecision::denied(
                RateLimitReason::DailyCap,
                retry_after_secs,
            ));
        }

        if let Some(last) = latest(&recent) {
            let next_allowed = last
                .submission_time
                .checked_add_signed(self.config.cooldown())
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now < next_allowed {
                let retry_after_secs = (next_allowed - now).num_seconds();
                warn!(
                    %ip,
                    last_submission = %last.submission_time,
                    retry_after_secs,
                    "Rate limited (cooldown)"
                );
                return Ok(RateLimitDecision::denied(
                    RateLimitReason::Cooldown,
                    Some(retry_after_secs),
                ));
            }
        }

        debug!(%ip, count, "Admission allowed");
        Ok(RateLimitDecision::allowed())
    }

    /// Log an accepted submission for `ip`. Every call appends a row.
    pub async fn record(&self, ip: &str) -> Result<IpSubmissionEntry, StoreError> {
        info!(%ip, "Recording submission");
        self.log.append(ip, self.clock.now()).await
    }

    /// Serialise admission for one IP.
    ///
    /// Holding the guard across `check`, the handler, and `record` closes
    /// the check-then-record race for concurrent requests from one address.
    /// Releasing the last guard for an IP removes its lock entry.
    pub async fn admission_lock(&self, ip: &str) -> AdmissionGuard {
        self.locks.acquire(ip).await
    }

    /// Drop lock entries nobody is holding or waiting on. Returns how many
    /// were removed.
    ///
    /// Entries are normally removed on release; this catches those left by
    /// a waiter that was cancelled after being woken.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}

fn oldest(entries: &[IpSubmissionEntry]) -> Option<&IpSubmissionEntry> {
    entries.iter().min_by_key(|e| e.submission_time)
}

fn latest(entries: &[IpSubmissionEntry]) -> Option<&IpSubmissionEntry> {
    entries.iter().max_by_key(|e| e.submission_time)
}

type LockMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Lazily created per-key async mutexes.
#[derive(Default)]
struct AdmissionLocks {
    inner: Arc<LockMap>,
}

impl AdmissionLocks {
    async fn acquire(&self, key: &str) -> AdmissionGuard {
        let lock = {
            let mut map = lock_map(&self.inner);
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        AdmissionGuard {
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
            locks: self.inner.clone(),
        }
    }

    fn prune(&self) -> usize {
        let mut map = lock_map(&self.inner);
        let before = map.len();
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - map.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_map(&self.inner).len()
    }
}

fn lock_map(map: &LockMap) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held admission for one IP. Dropping it releases the IP and forgets the
/// lock entry once no other request holds or awaits it.
pub struct AdmissionGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        // New holders clone the entry under this lock, so the count cannot
        // grow between the release and the check.
        let mut map = lock_map(&self.locks);
        drop(self.guard.take());
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    const IP: &str = "1.2.3.4";

    fn setup(config: RateLimitConfig) -> (RateLimiter, Arc<MemoryStore>, MockClock) {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
        let limiter = RateLimiter::new(config, store.clone(), Arc::new(clock.clone()));
        (limiter, store, clock)
    }

    #[tokio::test]
    async fn test_fresh_ip_allowed() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(decision, RateLimitDecision::allowed());
    }

    #[tokio::test]
    async fn test_cooldown_after_record() {
        let (limiter, _, clock) = setup(RateLimitConfig::default());
        limiter.record(IP).await.unwrap();

        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(
            decision,
            RateLimitDecision::denied(RateLimitReason::Cooldown, Some(300))
        );

        clock.advance(Duration::seconds(210));
        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(decision.retry_after_secs, Some(90));

        clock.advance(Duration::seconds(90));
        assert!(!limiter.check(IP).await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_daily_cap_retry_keyed_to_oldest_entry() {
        let (limiter, _, clock) = setup(RateLimitConfig::default());
        let start = clock.now();
        for _ in 0..3 {
            limiter.record(IP).await.unwrap();
            clock.advance(Duration::minutes(10));
        }

        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(decision.reason, RateLimitReason::DailyCap);
        let expected = ((start + Duration::minutes(1440)) - clock.now()).num_seconds();
        assert_eq!(decision.retry_after_secs, Some(expected));
    }

    #[tokio::test]
    async fn test_daily_cap_wins_over_cooldown() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        for _ in 0..3 {
            limiter.record(IP).await.unwrap();
        }
        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(decision.reason, RateLimitReason::DailyCap);
        assert_eq!(decision.retry_after_secs, Some(86_400));
    }

    #[tokio::test]
    async fn test_entries_outside_window_ignored() {
        let (limiter, _, clock) = setup(RateLimitConfig::default());
        for _ in 0..3 {
            limiter.record(IP).await.unwrap();
        }
        clock.advance(Duration::minutes(1440));
        assert!(!limiter.check(IP).await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_zero_cap_denies_everything() {
        let (limiter, _, _) = setup(RateLimitConfig {
            max_overall_requests: 0,
            ..Default::default()
        });
        let decision = limiter.check(IP).await.unwrap();
        assert_eq!(
            decision,
            RateLimitDecision::denied(RateLimitReason::DailyCap, None)
        );
    }

    #[tokio::test]
    async fn test_zero_cooldown_never_blocks() {
        let (limiter, _, _) = setup(RateLimitConfig {
            cooldown_minutes: 0,
            ..Default::default()
        });
        limiter.record(IP).await.unwrap();
        assert!(!limiter.check(IP).await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        limiter.record(IP).await.unwrap();
        assert!(limiter.check(IP).await.unwrap().limited);
        assert!(!limiter.check("::1").await.unwrap().limited);
    }

    #[tokio::test]
    async fn test_lock_entry_removed_on_release() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        drop(limiter.admission_lock("a").await);
        assert_eq!(limiter.tracked_locks(), 0);

        let held = limiter.admission_lock("a").await;
        let other = limiter.admission_lock("b").await;
        assert_eq!(limiter.tracked_locks(), 2);
        drop(other);
        assert_eq!(limiter.tracked_locks(), 1);
        drop(held);
        assert_eq!(limiter.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_lock_entry_kept_for_waiter() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        let held = limiter.admission_lock(IP).await;

        let mut waiting = Box::pin(limiter.admission_lock(IP));
        assert!(futures::poll!(&mut waiting).is_pending());

        drop(held);
        assert_eq!(limiter.tracked_locks(), 1);
        let next = waiting.await;
        assert_eq!(limiter.tracked_locks(), 1);
        drop(next);
        assert_eq!(limiter.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_prune_catches_cancelled_waiter() {
        let (limiter, _, _) = setup(RateLimitConfig::default());
        let held = limiter.admission_lock(IP).await;

        let mut waiting = Box::pin(limiter.admission_lock(IP));
        assert!(futures::poll!(&mut waiting).is_pending());
        drop(held);
        drop(waiting);

        assert_eq!(limiter.tracked_locks(), 1);
        assert_eq!(limiter.prune_locks(), 1);
        assert_eq!(limiter.tracked_locks(), 0);
    }
}
