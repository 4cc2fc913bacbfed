//! The process-wide forwarding rule.
//!
//! A [`ForwardingRule`] pairs the single upstream [`Origin`] with the local
//! listen address. It is built once at startup from a validated [`Config`]
//! and is read-only afterwards, so it is shared without locking.

use std::fmt;
use std::net::SocketAddr;

use axum::http::uri::{Authority, Scheme};
use axum::http::HeaderValue;

use super::model::Config;
use super::validation::{validate, validate_upstream_url};
use crate::error::{RelayError, ValidationError};

/// Scheme and authority of the upstream. Never carries a path or query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    scheme: Scheme,
    authority: Authority,
    host: HeaderValue,
}

impl Origin {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError {
            field: "upstream.url".into(),
            message,
            suggestion: None,
        };

        let url = validate_upstream_url(raw).map_err(invalid)?;
        let scheme = if url.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };

        // validate_upstream_url guarantees a host
        let host = url.host_str().unwrap_or_default();
        let authority = url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        let authority = Authority::try_from(authority.as_str())
            .map_err(|e| invalid(format!("invalid authority '{authority}': {e}")))?;
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|e| invalid(format!("invalid host header '{authority}': {e}")))?;

        Ok(Self {
            scheme,
            authority,
            host,
        })
    }

    #[must_use]
    pub const fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    #[must_use]
    pub const fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value sent upstream in the `Host` header.
    #[must_use]
    pub const fn host_header(&self) -> &HeaderValue {
        &self.host
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

#[derive(Debug, Clone)]
pub struct ForwardingRule {
    pub upstream: Origin,
    pub listen: SocketAddr,
}

impl ForwardingRule {
    /// Validate `config` and bind it to `listen`.
    ///
    /// Any validation failure is a configuration error: the caller must not
    /// start serving.
    pub fn new(config: &Config, listen: SocketAddr) -> Result<Self, RelayError> {
        validate(config).map_err(|errors| RelayError::ConfigValidation { errors })?;
        let upstream = Origin::parse(&config.upstream.url)
            .map_err(|e| RelayError::ConfigValidation { errors: vec![e] })?;
        Ok(Self { upstream, listen })
    }
}
