// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistence ports for submissions and the per-IP submission log.
//!
//! The service only depends on the two traits. `MemoryStore` implements
//! both and is what the binary runs with.

use crate::clock::Clock;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Submission fields supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSubmission {
    pub full_name: String,
    pub email: String,
    pub subject: String,
    pub message_text: String,
}

/// A stored contact form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub subject: String,
    pub message_text: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
    pub notification_retry_count: i32,
    pub last_notification_attempt_at: Option<DateTime<Utc>>,
}

/// One accepted submission from an IP. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpSubmissionEntry {
    pub id: i64,
    pub ip_address: String,
    pub submission_time: DateTime<Utc>,
}

/// Durable record of accepted submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a submission, assigning its id and `sent_at`.
    async fn save(&self, submission: NewSubmission) -> Result<SubmissionRecord, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<SubmissionRecord>, StoreError>;

    /// Flag a submission as read. Returns false if it does not exist.
    async fn mark_read(&self, id: i64) -> Result<bool, StoreError>;

    /// Delete every submission flagged as read, returning the count.
    async fn delete_read(&self) -> Result<usize, StoreError>;
}

/// Per-IP submission timestamp log.
#[async_trait]
pub trait IpSubmissionLog: Send + Sync {
    /// All entries for `ip` with `submission_time` strictly after `after`.
    async fn find_after(
        &self,
        ip: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<IpSubmissionEntry>, StoreError>;

    /// Append a new entry. No deduplication.
    async fn append(&self, ip: &str, at: DateTime<Utc>) -> Result<IpSubmissionEntry, StoreError>;

    /// Delete all entries with `submission_time` strictly before `before`.
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// In-process store implementing both ports.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    submissions: RwLock<BTreeMap<i64, SubmissionRecord>>,
    /// Entries grouped by IP, each list in append order
    ip_log: RwLock<BTreeMap<String, Vec<IpSubmissionEntry>>>,
    next_submission_id: AtomicI64,
    next_entry_id: AtomicI64,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            submissions: RwLock::new(BTreeMap::new()),
            ip_log: RwLock::new(BTreeMap::new()),
            next_submission_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
        }
    }

    /// Number of IP log entries across all addresses.
    pub async fn ip_entry_count(&self) -> usize {
        self.ip_log.read().await.values().map(Vec::len).sum()
    }

    /// Number of stored submissions.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn save(&self, submission: NewSubmission) -> Result<SubmissionRecord, StoreError> {
        let id = self.next_submission_id.fetch_add(1, Ordering::Relaxed);
        let record = SubmissionRecord {
            id,
            full_name: submission.full_name,
            email: submission.email,
            subject: submission.subject,
            message_text: submission.message_text,
            sent_at: self.clock.now(),
            is_read: false,
            notification_retry_count: 0,
            last_notification_attempt_at: None,
        };
        self.submissions.write().await.insert(id, record.clone());
        debug!(id, "Submission stored");
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<SubmissionRecord>, StoreError> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }

    async fn mark_read(&self, id: i64) -> Result<bool, StoreError> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&id) {
            Some(record) => {
                record.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_read(&self) -> Result<usize, StoreError> {
        let mut submissions = self.submissions.write().await;
        let before = submissions.len();
        submissions.retain(|_, record| !record.is_read);
        Ok(before - submissions.len())
    }
}

#[async_trait]
impl IpSubmissionLog for MemoryStore {
    async fn find_after(
        &self,
        ip: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<IpSubmissionEntry>, StoreError> {
        let log = self.ip_log.read().await;
        Ok(log
            .get(ip)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.submission_time > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, ip: &str, at: DateTime<Utc>) -> Result<IpSubmissionEntry, StoreError> {
        let entry = IpSubmissionEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::Relaxed),
            ip_address: ip.to_string(),
            submission_time: at,
        };
        self.ip_log
            .write()
            .await
            .entry(ip.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut log = self.ip_log.write().await;
        let mut deleted = 0;
        log.retain(|_, entries| {
            let len = entries.len();
            entries.retain(|e| e.submission_time >= before);
            deleted += len - entries.len();
            !entries.is_empty()
        });
        Ok(deleted)
    }
}
