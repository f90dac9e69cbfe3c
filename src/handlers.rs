// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact intake service.
//!
//! `POST /api/contact` sits behind the admission gate; health and metrics
//! endpoints are not rate limited. Every request is bounded by
//! `request-timeout-ms` and answered with 408 once it elapses.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::AppError;
use crate::gate::{admission_gate, AdmissionGate, ClientIp};
use crate::intake::SubmissionIntake;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::notifier::Notifier;
use crate::store::{IpSubmissionLog, NewSubmission, SubmissionStore};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Body returned for an accepted submission.
pub const SUBMITTED: &str = "Contact form submitted successfully!";

/// Shared application state.
pub struct AppState {
    pub intake: SubmissionIntake,
    pub gate: AdmissionGate,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    /// Wire the limiter, gate and intake over the given ports.
    pub fn new(
        config: Config,
        submissions: Arc<dyn SubmissionStore>,
        log: Arc<dyn IpSubmissionLog>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), log, clock));
        Self {
            intake: SubmissionIntake::new(submissions, limiter.clone(), notifier, metrics.clone()),
            gate: AdmissionGate::new(limiter, metrics.clone()),
            metrics,
            config,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.gate.limiter
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let contact = Router::new()
        .route("/api/contact", post(submit_contact))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            admission_gate,
        ));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .merge(contact);

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-intake",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept a contact form submission that passed the admission gate.
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    payload: Result<Json<NewSubmission>, JsonRejection>,
) -> Result<&'static str, AppError> {
    let Json(submission) = payload?;
    debug!(%ip, subject = %submission.subject, "Processing contact form submission");

    let record = state.intake.submit(&ip, submission).await?;
    info!(%ip, id = record.id, "Contact form submission accepted");

    Ok(SUBMITTED)
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    ))
}
