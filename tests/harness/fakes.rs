// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Port implementations with scripted behaviour.

use async_trait::async_trait;
use contact_intake::{
    error::{NotifyError, StoreError},
    notifier::{NotificationMessage, Notifier},
    store::{NewSubmission, SubmissionRecord, SubmissionStore},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Captures every published message; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<NotificationMessage>>,
    attempts: Mutex<usize>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn published(&self) -> Vec<NotificationMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected(503));
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Submission store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl SubmissionStore for FailingStore {
    async fn save(&self, _submission: NewSubmission) -> Result<SubmissionRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _id: i64) -> Result<Option<SubmissionRecord>, StoreError> {
        Ok(None)
    }

    async fn mark_read(&self, _id: i64) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn delete_read(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
