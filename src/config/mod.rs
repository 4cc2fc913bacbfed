//! Configuration loading and validation.
//!
//! Defines the [`ConfigSource`] trait for the places an upstream can be
//! configured from (CLI flags or a config file) and [`ConfigVersion`],
//! the content hash reported by the health endpoint. Submodules hold the
//! data model, validation, the immutable [`rule::ForwardingRule`], and
//! the concrete sources.

pub mod model;
pub mod rule;
pub mod sources;
pub mod validation;

use async_trait::async_trait;

use crate::error::RelayError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// First eight hex digits, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

// async_trait is required here because sources are used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(Config, ConfigVersion), RelayError>;
}
