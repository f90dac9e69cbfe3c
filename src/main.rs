// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Intake Service
//!
//! Accepts `POST /api/contact` submissions, enforcing per-IP admission:
//!
//! - 3 submissions per IP per 24 hours (default)
//! - 5 minute cooldown between submissions (default)
//!
//! ## Configuration
//!
//! Configuration is loaded from an optional `contact-intake.toml` (or the
//! file named by `CONTACT_INTAKE_CONFIG`) and environment variables:
//!
//! - `CONTACT_INTAKE__BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `CONTACT_INTAKE__RATE_LIMIT__MAX_OVERALL_REQUESTS` (default: 3)
//! - `CONTACT_INTAKE__RATE_LIMIT__OVERALL_WINDOW_MINUTES` (default: 1440)
//! - `CONTACT_INTAKE__RATE_LIMIT__COOLDOWN_MINUTES` (default: 5)
//! - `CONTACT_INTAKE__DATA_CLEANUP__DAYS_OLD` (default: 20)
//! - `CONTACT_INTAKE__NOTIFIER__KIND`: `log` or `http` (default: log)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_intake::{
    cleanup::CleanupSweep,
    clock::{Clock, SystemClock},
    config::Config,
    handlers::{router, AppState},
    metrics::Metrics,
    notifier,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        max_overall_requests = config.rate_limit.max_overall_requests,
        overall_window_minutes = config.rate_limit.overall_window_minutes,
        cooldown_minutes = config.rate_limit.cooldown_minutes,
        notifier = ?config.notifier.kind,
        "Starting contact intake service"
    );

    // Create application state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let metrics = Metrics::new()?;
    let notifier = notifier::from_config(&config.notifier)?;

    let state = Arc::new(AppState::new(
        config.clone(),
        store.clone(),
        store.clone(),
        notifier,
        clock.clone(),
        metrics.clone(),
    ));

    // Spawn cleanup task
    let sweep = Arc::new(CleanupSweep::new(
        config.data_cleanup.clone(),
        store.clone(),
        store,
        state.limiter().clone(),
        clock,
        metrics,
    ));
    sweep.spawn(config.data_cleanup.interval());

    // Start server
    let app = router(state);
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
