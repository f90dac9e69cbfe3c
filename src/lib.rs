// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Intake
//!
//! This crate accepts contact form submissions over HTTP and gates them
//! with a per-IP admission policy:
//!
//! - Daily cap (3 submissions per 24h default)
//! - Cooldown between submissions (5 minutes default)
//! - 429 responses with `Retry-After` and a human-readable retry hint
//! - Fire-and-forget notification of each stored submission
//! - Periodic retention sweep of the submission log

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod humanize;
pub mod intake;
pub mod limiter;
pub mod metrics;
pub mod notifier;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use limiter::{RateLimitDecision, RateLimitReason, RateLimiter};
pub use store::MemoryStore;
