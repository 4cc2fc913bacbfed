//! Config source built from `--upstream` on the command line.

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::RelayError;

pub struct ArgsSource {
    upstream: String,
}

impl ArgsSource {
    #[must_use]
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
        }
    }
}

#[async_trait]
impl ConfigSource for ArgsSource {
    fn name(&self) -> &'static str {
        "args"
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), RelayError> {
        let config = Config::for_upstream(self.upstream.clone());
        if let Err(errors) = validate(&config) {
            return Err(RelayError::ConfigValidation { errors });
        }
        let hash = sha256_hex(self.upstream.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
