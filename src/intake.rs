// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Store-then-record-then-notify flow for admitted submissions.

use crate::error::{AppError, Result};
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::notifier::{spawn_publish, NotificationMessage, Notifier};
use crate::store::{NewSubmission, SubmissionRecord, SubmissionStore};
use std::sync::Arc;
use tracing::{error, info};

/// Handles a submission the admission gate has already let through.
pub struct SubmissionIntake {
    store: Arc<dyn SubmissionStore>,
    limiter: Arc<RateLimiter>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
}

impl SubmissionIntake {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        limiter: Arc<RateLimiter>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            limiter,
            notifier,
            metrics,
        }
    }

    /// Persist the submission, log it against `ip`, then notify.
    ///
    /// The notification runs in the background; its outcome never affects
    /// the stored submission or the rate limit entry.
    pub async fn submit(&self, ip: &str, submission: NewSubmission) -> Result<SubmissionRecord> {
        info!(email = %submission.email, "Saving contact form submission");

        let record = self.store.save(submission).await.map_err(|err| {
            error!(error = %err, "Failed to save contact form submission");
            AppError::Store(err)
        })?;
        info!(id = record.id, %ip, "Contact form submission saved");
        self.metrics.submission();

        self.limiter.record(ip).await?;

        spawn_publish(
            self.notifier.clone(),
            NotificationMessage::from(&record),
            self.metrics.clone(),
        );

        Ok(record)
    }
}
