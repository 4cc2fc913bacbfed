//! Serde data structures for the hostrelay configuration file.
//!
//! [`Config`] is the root: one [`UpstreamConfig`] naming the single origin
//! every request is forwarded to, plus [`HeaderPolicy`] toggles for the
//! optional header transforms. All types use `deny_unknown_fields`.

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    30_000
}

const fn default_pool_idle_timeout() -> u64 {
    90
}

const fn default_pool_max_idle() -> usize {
    32
}

const fn default_true() -> bool {
    true
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_pool_idle_timeout(v: &u64) -> bool {
    *v == default_pool_idle_timeout()
}

fn is_default_pool_max_idle(v: &usize) -> bool {
    *v == default_pool_max_idle()
}

fn is_true(v: &bool) -> bool {
    *v
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub upstream: UpstreamConfig,

    #[serde(default, skip_serializing_if = "HeaderPolicy::is_default")]
    pub headers: HeaderPolicy,
}

impl Config {
    /// A config pointing at `url` with every other setting at its default.
    #[must_use]
    pub fn for_upstream(url: impl Into<String>) -> Self {
        Self {
            upstream: UpstreamConfig::new(url),
            headers: HeaderPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Origin (scheme + host, optional port) all requests are sent to.
    pub url: String,

    /// Milliseconds to wait for upstream response headers.
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    /// Seconds an idle pooled connection is kept open.
    #[serde(
        default = "default_pool_idle_timeout",
        skip_serializing_if = "is_default_pool_idle_timeout"
    )]
    pub pool_idle_timeout: u64,

    #[serde(
        default = "default_pool_max_idle",
        skip_serializing_if = "is_default_pool_max_idle"
    )]
    pub pool_max_idle_per_host: usize,
}

impl UpstreamConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: default_timeout(),
            pool_idle_timeout: default_pool_idle_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderPolicy {
    /// Append the caller address to `X-Forwarded-For`.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
        }
    }
}

impl HeaderPolicy {
    fn is_default(&self) -> bool {
        self.proxy_headers && self.strip_hop_by_hop
    }
}
