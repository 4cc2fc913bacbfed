//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared, read-only state: forwarding
//! rule, director, engine, stats), [`build_router`] for the proxy listener,
//! [`build_admin_router`] for the separate health listener, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::model::Config;
use crate::config::rule::ForwardingRule;
use crate::config::ConfigVersion;
use crate::health::health_handler;
use crate::proxy;
use crate::proxy::director::Director;
use crate::proxy::engine::ForwardingEngine;
use crate::proxy::transport::Transport;

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }
}

pub struct AppState {
    pub rule: ForwardingRule,
    pub director: Director,
    pub engine: ForwardingEngine,
    pub config_version: ConfigVersion,
    pub source_name: String,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Wire the director and engine for `rule` around an explicit transport.
    #[must_use]
    pub fn new(
        rule: ForwardingRule,
        config: &Config,
        transport: Arc<dyn Transport>,
        config_version: ConfigVersion,
        source_name: impl Into<String>,
    ) -> Self {
        let director = Director::from_policy(rule.upstream.clone(), &config.headers);
        let engine = ForwardingEngine::new(
            transport,
            Duration::from_millis(config.upstream.timeout),
        );
        Self {
            rule,
            director,
            engine,
            config_version,
            source_name: source_name.into(),
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

/// Router for the proxy listener. Every method and path goes upstream,
/// `/health` included.
pub fn build_router(state: Arc<AppState>, max_body: Option<usize>) -> Router {
    Router::new()
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body.unwrap_or(usize::MAX))),
        )
        .with_state(state)
}

pub fn build_admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
