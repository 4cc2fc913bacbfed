//! Forwarding of a directed request to the upstream.
//!
//! [`ForwardingEngine::forward`] makes exactly one attempt per request. It
//! waits for response headers under the configured timeout and then hands
//! back the upstream response with its body still streaming. Nothing is
//! buffered, so a body can be arbitrarily large.
//!
//! Once the status line has been relayed, an upstream failure can no longer
//! become a 502. The body yields an error instead, and the HTTP server
//! aborts the caller's connection.
//!
//! An upgrade request (`Connection: Upgrade`) answered with `101 Switching
//! Protocols` is relayed as a 101 and both connections are then spliced
//! together in a background task until either side closes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use super::headers::{strip_response_hop_by_hop, upgrade_type};
use super::transport::Transport;
use crate::error::ProxyError;

#[derive(Clone)]
pub struct ForwardingEngine {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ForwardingEngine {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `request` and return the upstream response for relay.
    ///
    /// Dropping the returned future (caller went away) drops the in-flight
    /// upstream request with it.
    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let requested_upgrade = upgrade_type(request.headers())
            .map(|protocol| (protocol, hyper::upgrade::on(&mut request)));

        let response = match tokio::time::timeout(self.timeout, self.transport.send(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => return Err(ProxyError::Gateway { source }),
            Err(_) => return Err(ProxyError::GatewayTimeout(self.timeout)),
        };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            return switch_protocols(response, requested_upgrade);
        }

        let (mut parts, body) = response.into_parts();
        strip_response_hop_by_hop(&mut parts.headers, parts.status);

        let body = body.map_err(|e| {
            tracing::warn!(error = %e, "upstream body failed mid-stream, aborting client connection");
            e
        });
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Relay a 101 and splice the caller and upstream connections once both
/// sides have switched.
///
/// The upstream must switch to the protocol the caller asked for.
fn switch_protocols(
    mut response: Response<Body>,
    requested: Option<(HeaderValue, OnUpgrade)>,
) -> Result<Response<Body>, ProxyError> {
    let offered = upgrade_type(response.headers());
    let Some((protocol, client)) = requested else {
        return Err(ProxyError::Gateway {
            source: "upstream switched protocols without an upgrade request".into(),
        });
    };
    if !offered
        .as_ref()
        .is_some_and(|o| o.as_bytes().eq_ignore_ascii_case(protocol.as_bytes()))
    {
        return Err(ProxyError::Gateway {
            source: format!(
                "upstream tried to switch protocol to {offered:?} when {protocol:?} was requested"
            )
            .into(),
        });
    }

    let upstream = hyper::upgrade::on(&mut response);
    tokio::spawn(tunnel(client, upstream));

    let (mut parts, _body) = response.into_parts();
    strip_response_hop_by_hop(&mut parts.headers, parts.status);
    Ok(Response::from_parts(parts, Body::empty()))
}

async fn tunnel(client: OnUpgrade, upstream: OnUpgrade) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "protocol upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((from_client, from_upstream)) => {
            tracing::debug!(from_client, from_upstream, "upgraded connection closed");
        }
        Err(e) => tracing::debug!(error = %e, "upgraded connection ended with error"),
    }
}
