//! Core HTTP request forwarding handler.
//!
//! [`forward_handler`] is the Axum fallback that receives every inbound
//! request, whatever its method or path. It runs the request through the
//! [`director`] and hands the result to the [`engine`]; the upstream's
//! response, or a 502/504 of our own, goes back to the caller.
//! [`headers`] holds the header rules both sides share and [`transport`]
//! the pluggable upstream client.

pub mod director;
pub mod engine;
pub mod headers;
pub mod transport;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::server::AppState;

pub async fn forward_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        "proxying request"
    );

    let outbound = state.director.apply(request);

    match state.engine.forward(outbound).await {
        Ok(response) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                correlation_id = %correlation_id,
                status = response.status().as_u16(),
                "upstream responded"
            );
            response
        }
        Err(e) => {
            match &e {
                ProxyError::Gateway { .. } => {
                    state.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        correlation_id = %correlation_id,
                        method = %method,
                        path = %path,
                        upstream = %state.rule.upstream,
                        error = %e,
                        "forwarding failed"
                    );
                }
                ProxyError::GatewayTimeout(_) => {
                    state.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        method = %method,
                        path = %path,
                        upstream = %state.rule.upstream,
                        error = %e,
                        "upstream timed out"
                    );
                }
            }
            e.into_response()
        }
    }
}
