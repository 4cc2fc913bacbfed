//! Request transformation ahead of forwarding.
//!
//! A [`Director`] turns an inbound request into the outbound request for
//! the upstream by running an ordered list of [`Transform`] functions over
//! the request head. The body is never touched, so the body type is
//! generic and the request can still stream.
//!
//! The default pipeline, in order:
//!
//! 1. [`strip_hop_by_hop`] (if enabled by [`HeaderPolicy`])
//! 2. [`rewrite_target`]
//! 3. [`append_forwarded_for`] (if enabled by [`HeaderPolicy`])
//! 4. [`collapse_authorization`] (always)

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::uri::{self, PathAndQuery};
use axum::http::{Request, Uri};

use super::headers;
use crate::config::model::HeaderPolicy;
use crate::config::rule::Origin;

/// One step of the director pipeline. Must not fail and must not touch the body.
pub type Transform = fn(&Origin, &mut Parts);

#[derive(Clone)]
pub struct Director {
    origin: Origin,
    transforms: Vec<Transform>,
}

impl Director {
    #[must_use]
    pub const fn new(origin: Origin, transforms: Vec<Transform>) -> Self {
        Self { origin, transforms }
    }

    /// Build the default pipeline for `policy`.
    #[must_use]
    pub fn from_policy(origin: Origin, policy: &HeaderPolicy) -> Self {
        let mut transforms: Vec<Transform> = Vec::with_capacity(4);
        if policy.strip_hop_by_hop {
            transforms.push(strip_hop_by_hop);
        }
        transforms.push(rewrite_target);
        if policy.proxy_headers {
            transforms.push(append_forwarded_for);
        }
        transforms.push(collapse_authorization);
        Self::new(origin, transforms)
    }

    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Produce the outbound request. Every transform has run before this
    /// returns, so nothing is sent upstream from a half-rewritten head.
    pub fn apply<B>(&self, request: Request<B>) -> Request<B> {
        let (mut parts, body) = request.into_parts();
        for transform in &self.transforms {
            transform(&self.origin, &mut parts);
        }
        Request::from_parts(parts, body)
    }
}

pub fn strip_hop_by_hop(_origin: &Origin, parts: &mut Parts) {
    headers::strip_hop_by_hop(&mut parts.headers);
}

/// Point the URI and `Host` header at the upstream, keeping path and query.
pub fn rewrite_target(origin: &Origin, parts: &mut Parts) {
    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let mut uri_parts = uri::Parts::default();
    uri_parts.scheme = Some(origin.scheme().clone());
    uri_parts.authority = Some(origin.authority().clone());
    uri_parts.path_and_query = Some(path_and_query);

    match Uri::from_parts(uri_parts) {
        Ok(uri) => parts.uri = uri,
        Err(e) => tracing::debug!(uri = %parts.uri, error = %e, "request target not rewritable"),
    }
    parts.headers.insert(HOST, origin.host_header().clone());
}

/// Append the caller IP to `X-Forwarded-For` when connection info is available.
pub fn append_forwarded_for(_origin: &Origin, parts: &mut Parts) {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        let ip = addr.ip();
        headers::append_forwarded_for(&mut parts.headers, ip);
    }
}

pub fn collapse_authorization(_origin: &Origin, parts: &mut Parts) {
    headers::collapse_authorization(&mut parts.headers);
}
