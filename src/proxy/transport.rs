//! The upstream transport seam.
//!
//! [`Transport`] is the only thing the forwarding engine knows about the
//! network. [`HyperTransport`] is the production implementation: a
//! connection-pooled hyper client speaking HTTP or HTTPS. Tests substitute
//! their own implementations.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::model::UpstreamConfig;
use crate::error::BoxError;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Body>;

// async_trait keeps Transport object-safe for Arc<dyn Transport>.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and resolve once response headers arrive. The body
    /// of the returned response streams from the upstream.
    ///
    /// Dropping the returned future aborts the request.
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError>;
}

#[must_use]
pub fn build_http_client(upstream: &UpstreamConfig) -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(upstream.pool_idle_timeout))
        .pool_max_idle_per_host(upstream.pool_max_idle_per_host)
        .build(https)
}

#[derive(Clone)]
pub struct HyperTransport {
    client: HttpClient,
}

impl HyperTransport {
    #[must_use]
    pub fn new(upstream: &UpstreamConfig) -> Self {
        Self {
            client: build_http_client(upstream),
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        let response = self.client.request(request).await?;
        Ok(response.map(Body::new))
    }
}
