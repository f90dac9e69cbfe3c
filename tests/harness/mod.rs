// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures for driving the service through its router.

#![allow(dead_code)]

pub mod fakes;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, Response},
    Router,
};
use chrono::{TimeZone, Utc};
use contact_intake::{
    clock::{Clock, MockClock},
    config::{Config, RateLimitConfig},
    handlers::{router, AppState},
    metrics::Metrics,
    notifier::Notifier,
    store::{IpSubmissionLog, MemoryStore, SubmissionStore},
};
use fakes::RecordingNotifier;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// A router wired over in-memory fakes with a controllable clock.
pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: MockClock,
    pub metrics: Metrics,
}

impl TestApp {
    pub fn new(rate_limit: RateLimitConfig) -> Self {
        Self::with_config(Config {
            rate_limit,
            ..Default::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
        Self::with_ports(config, clock, store.clone(), store, RecordingNotifier::new())
    }

    /// Build with a custom submission store, keeping the in-memory IP log.
    pub fn with_submissions(
        rate_limit: RateLimitConfig,
        submissions: Arc<dyn SubmissionStore>,
        notifier: RecordingNotifier,
    ) -> Self {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
        let config = Config {
            rate_limit,
            ..Default::default()
        };
        Self::with_ports(config, clock, submissions, store, notifier)
    }

    fn with_ports(
        config: Config,
        clock: MockClock,
        submissions: Arc<dyn SubmissionStore>,
        store: Arc<MemoryStore>,
        notifier: RecordingNotifier,
    ) -> Self {
        let metrics = Metrics::new().unwrap();
        let notifier = Arc::new(notifier);
        let log: Arc<dyn IpSubmissionLog> = store.clone();
        let publisher: Arc<dyn Notifier> = notifier.clone();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let state = Arc::new(AppState::new(
            config,
            submissions,
            log,
            publisher,
            shared_clock,
            metrics.clone(),
        ));

        Self {
            app: router(state.clone()),
            state,
            store,
            notifier,
            clock,
            metrics,
        }
    }

    /// POST `body` to `/api/contact` from `ip`.
    pub async fn send(&self, ip: &str, body: Body) -> Response<Body> {
        let addr: SocketAddr = SocketAddr::new(ip.parse().unwrap(), 40_000);
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// POST a JSON body to `/api/contact` from `ip`.
    pub async fn submit_raw(&self, ip: &str, body: &str) -> Response<Body> {
        self.send(ip, Body::from(body.to_string())).await
    }

    pub async fn submit(&self, ip: &str) -> Response<Body> {
        self.submit_raw(ip, &sample_body()).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn sample_body() -> String {
    serde_json::json!({
        "fullName": "Grace Hopper",
        "email": "grace@example.com",
        "subject": "Compilers",
        "messageText": "Hello from the harness"
    })
    .to_string()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Poll `cond` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
