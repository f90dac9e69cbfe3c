// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Admission middleware in front of the submission handler.
//!
//! Denied requests are answered with 429, a `Retry-After` header and a
//! JSON `{"message": ...}` body; the wrapped handler never runs.
//!
//! The request body is read in full before the per-IP lock is taken, so a
//! client that stalls mid-upload holds nothing but its own connection.

use crate::error::AppError;
use crate::humanize::retry_message;
use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::metrics::Metrics;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Largest submission body the gate will buffer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Client address as seen by the gate, for handlers behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Rejection body.
#[derive(Debug, Serialize)]
pub struct RateLimitBody {
    pub message: String,
}

/// Middleware state.
#[derive(Clone)]
pub struct AdmissionGate {
    pub limiter: Arc<RateLimiter>,
    pub metrics: Metrics,
}

impl AdmissionGate {
    pub fn new(limiter: Arc<RateLimiter>, metrics: Metrics) -> Self {
        Self { limiter, metrics }
    }
}

/// Check admission for the peer address before running the handler.
///
/// The per-IP lock is held until the handler has finished, so the
/// handler's `record` lands before the next request from the same IP is
/// checked. Only a fully buffered request reaches that point.
pub async fn admission_gate(
    State(gate): State<AdmissionGate>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = addr.ip().to_canonical().to_string();

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%ip, error = %err, "Failed to read submission body");
            return AppError::Validation("Failed to read request body".to_string()).into_response();
        }
    };
    let mut request = Request::from_parts(parts, Body::from(bytes));

    let _guard = gate.limiter.admission_lock(&ip).await;

    let decision = match gate.limiter.check(&ip).await {
        Ok(decision) => decision,
        Err(err) => return AppError::Store(err).into_response(),
    };
    gate.metrics.admission(decision.reason);

    if decision.limited {
        let response = rejection(&decision);
        warn!(
            %ip,
            reason = %decision.reason,
            retry_after_secs = ?decision.retry_after_secs,
            "Submission rejected by admission gate"
        );
        return response;
    }

    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

/// Build the 429 response for a denied decision.
///
/// A missing retry value is sent as `Retry-After: 0`.
pub fn rejection(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs.unwrap_or(0).max(0);
    let message = retry_message(decision.reason.base_message(), decision.retry_after_secs);

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(RateLimitBody { message })).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
