//! `hostrelay validate` — check a config file without starting the proxy.
//!
//! Runs the same parse and validation steps as `run`, then resolves the
//! upstream origin exactly as the forwarding rule would.

use std::path::Path;

use serde::Serialize;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::Config;
use crate::config::rule::Origin;
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::{RelayError, ValidationError};

#[derive(Serialize)]
struct Issue<'a> {
    field: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

impl<'a> From<&'a ValidationError> for Issue<'a> {
    fn from(e: &'a ValidationError) -> Self {
        Self {
            field: &e.field,
            message: &e.message,
            suggestion: e.suggestion.as_deref(),
        }
    }
}

pub fn execute(args: &ValidateArgs) -> Result<(), RelayError> {
    let path = args.config.as_path();
    if !path.exists() {
        return Err(RelayError::ConfigFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let config = read_config(path)?;

    match check(&config) {
        Ok(origin) => {
            report_valid(args, path, &config, &origin);
            Ok(())
        }
        Err(errors) => {
            report_invalid(args, path, &errors);
            Err(RelayError::ConfigValidation { errors })
        }
    }
}

fn read_config(path: &Path) -> Result<Config, RelayError> {
    let content = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_config_str(ext, &content, &path.display().to_string())
}

fn check(config: &Config) -> Result<Origin, Vec<ValidationError>> {
    validation::validate(config)?;
    Origin::parse(&config.upstream.url).map_err(|e| vec![e])
}

fn report_valid(args: &ValidateArgs, path: &Path, config: &Config, origin: &Origin) {
    match args.format {
        ValidateFormat::Text => println!(
            "\u{2713} {}",
            validation::format_validation_report(&path.display().to_string(), config)
        ),
        ValidateFormat::Json => println!(
            "{}",
            serde_json::json!({
                "valid": true,
                "upstream": origin.to_string(),
                "host": origin.host_header().to_str().unwrap_or_default(),
                "timeout_ms": config.upstream.timeout,
                "proxy_headers": config.headers.proxy_headers,
                "strip_hop_by_hop": config.headers.strip_hop_by_hop,
            })
        ),
    }
}

fn report_invalid(args: &ValidateArgs, path: &Path, errors: &[ValidationError]) {
    match args.format {
        ValidateFormat::Text => {
            let noun = if errors.len() == 1 { "error" } else { "errors" };
            eprintln!("\u{2717} {} has {} {noun}\n", path.display(), errors.len());
            for error in errors {
                eprintln!("{error}");
            }
        }
        ValidateFormat::Json => {
            let issues: Vec<Issue<'_>> = errors.iter().map(Issue::from).collect();
            println!(
                "{}",
                serde_json::json!({ "valid": false, "errors": issues })
            );
        }
    }
}
