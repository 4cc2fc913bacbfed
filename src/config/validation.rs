//! Configuration validation with detailed error reporting.
//!
//! [`validate`] checks a parsed [`Config`] before a forwarding rule is
//! built from it. The upstream must be a bare origin: an `http`/`https`
//! URL with a host and nothing after it. Every failure is reported as a
//! [`ValidationError`] with a suggestion where one is obvious.

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Parse and check an upstream origin URL. Returns the parsed URL or a
/// human-readable error.
pub fn validate_upstream_url(raw: &str) -> Result<Url, String> {
    let parsed = Url::parse(raw).map_err(|_| format!("'{raw}' is not a valid URL"))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!(
            "unsupported scheme '{scheme}' (expected http or https)"
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("URL has no host".into());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("credentials in the upstream URL are not supported".into());
    }
    if parsed.path() != "/" && !parsed.path().is_empty() {
        return Err(format!(
            "upstream must be an origin without a path, found '{}'",
            parsed.path()
        ));
    }
    if parsed.query().is_some() {
        return Err("upstream must not carry a query string".into());
    }
    if parsed.fragment().is_some() {
        return Err("upstream must not carry a fragment".into());
    }
    Ok(parsed)
}

fn origin_suggestion(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    let origin = parsed
        .port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
    Some(format!("did you mean '{}://{origin}'?", parsed.scheme()))
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let upstream = &config.upstream;

    if upstream.url.trim().is_empty() {
        errors.push(ValidationError {
            field: "upstream.url".into(),
            message: "upstream URL cannot be empty".into(),
            suggestion: Some("e.g. 'https://api.example.com'".into()),
        });
    } else if let Err(msg) = validate_upstream_url(&upstream.url) {
        let suggestion = if msg.contains("without a path") || msg.contains("query") {
            origin_suggestion(&upstream.url)
        } else if !upstream.url.contains("://") {
            Some(format!("did you mean 'http://{}'?", upstream.url))
        } else {
            None
        };
        errors.push(ValidationError {
            field: "upstream.url".into(),
            message: msg,
            suggestion,
        });
    }

    if upstream.timeout == 0 {
        errors.push(ValidationError {
            field: "upstream.timeout".into(),
            message: "timeout must be greater than 0".into(),
            suggestion: None,
        });
    }

    if upstream.pool_idle_timeout == 0 {
        errors.push(ValidationError {
            field: "upstream.pool_idle_timeout".into(),
            message: "pool idle timeout must be greater than 0".into(),
            suggestion: None,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let upstream = &config.upstream;
    let on_off = |b: bool| if b { "on" } else { "off" };
    let lines = [
        format!("  upstream: {}", upstream.url),
        format!("    timeout: {}ms", upstream.timeout),
        format!(
            "    pool: {} idle per host, {}s idle timeout",
            upstream.pool_max_idle_per_host, upstream.pool_idle_timeout
        ),
        format!(
            "  headers: proxy_headers {}, strip_hop_by_hop {}",
            on_off(config.headers.proxy_headers),
            on_off(config.headers.strip_hop_by_hop)
        ),
    ];
    format!("{} is valid\n{}", path, lines.join("\n"))
}
