//! `hostrelay init` — generate a starter configuration file.
//!
//! Serializes a default [`Config`] for the given upstream in YAML, JSON,
//! or TOML. Refuses to overwrite an existing file.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::error::RelayError;

const HEADER: &str = "# hostrelay config\n\
# upstream.timeout (ms), upstream.pool_idle_timeout (s), upstream.pool_max_idle_per_host\n\
# and headers.proxy_headers / headers.strip_hop_by_hop may be added; defaults apply otherwise.\n\n";

pub fn execute(args: &InitArgs) -> Result<(), RelayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("hostrelay.{}", args.format.extension())));

    if output.exists() {
        return Err(RelayError::FileExists { path: output });
    }

    let config = Config::for_upstream(args.upstream.clone());
    if let Err(errors) = validate(&config) {
        return Err(RelayError::ConfigValidation { errors });
    }

    let content = render(&config, &args.format)?;
    std::fs::write(&output, content)?;
    println!("Created {}", output.display());
    Ok(())
}

/// Serialize `config` in `format`, with a comment header where the format allows one.
pub fn render(config: &Config, format: &ConfigFormat) -> Result<String, RelayError> {
    let body = serialize_config(config, format)?;
    Ok(match format {
        ConfigFormat::Json => body,
        ConfigFormat::Yaml | ConfigFormat::Toml => format!("{HEADER}{body}"),
    })
}

fn serialize_config(config: &Config, format: &ConfigFormat) -> Result<String, RelayError> {
    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => {
            serde_yml::to_string(config).map_err(|e| RelayError::Io(std::io::Error::other(e.to_string())))
        }

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(RelayError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| RelayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map_err(|e| RelayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(RelayError::UnsupportedFormat("toml".into())),
    }
}
