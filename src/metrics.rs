// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for admission and intake.

use crate::limiter::RateLimitReason;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service metrics, registered on a private registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    admissions: IntCounterVec,
    submissions: IntCounter,
    notify_failures: IntCounter,
    cleanup_deleted: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            Opts::new("contact_admission_total", "Admission decisions by outcome"),
            &["outcome"],
        )?;
        let submissions = IntCounter::new(
            "contact_submissions_total",
            "Contact form submissions accepted and stored",
        )?;
        let notify_failures = IntCounter::new(
            "contact_notify_failures_total",
            "Notification publishes that failed",
        )?;
        let cleanup_deleted = IntCounterVec::new(
            Opts::new("contact_cleanup_deleted_total", "Rows removed by the cleanup sweep"),
            &["kind"],
        )?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(notify_failures.clone()))?;
        registry.register(Box::new(cleanup_deleted.clone()))?;

        Ok(Self {
            registry,
            admissions,
            submissions,
            notify_failures,
            cleanup_deleted,
        })
    }

    pub fn admission(&self, reason: RateLimitReason) {
        self.admissions.with_label_values(&[reason.as_str()]).inc();
    }

    pub fn submission(&self) {
        self.submissions.inc();
    }

    pub fn notify_failure(&self) {
        self.notify_failures.inc();
    }

    pub fn cleanup_deleted(&self, kind: &str, count: usize) {
        self.cleanup_deleted
            .with_label_values(&[kind])
            .inc_by(count as u64);
    }

    pub fn admission_count(&self, reason: RateLimitReason) -> u64 {
        self.admissions.with_label_values(&[reason.as_str()]).get()
    }

    pub fn submission_count(&self) -> u64 {
        self.submissions.get()
    }

    pub fn notify_failure_count(&self) -> u64 {
        self.notify_failures.get()
    }

    /// Render the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
