//! `GET /health` endpoint handler for the admin listener.
//!
//! Returns a [`HealthResponse`] JSON payload with the server version,
//! uptime, the forwarding rule in effect, config source metadata, and
//! cumulative request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub upstream: UpstreamHealth,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct UpstreamHealth {
    pub origin: String,
    pub listen: String,
    pub timeout_ms: u64,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_timed_out: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    #[allow(clippy::cast_possible_truncation)]
    let timeout_ms = state.engine.timeout().as_millis() as u64;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        upstream: UpstreamHealth {
            origin: state.rule.upstream.to_string(),
            listen: state.rule.listen.to_string(),
            timeout_ms,
        },
        config: ConfigHealth {
            source: state.source_name.clone(),
            version: state.config_version.short().to_string(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_timed_out: state.stats.timed_out.load(Ordering::Relaxed),
        },
    })
}
