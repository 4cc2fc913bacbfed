//! Header normalization applied on the way to and from the upstream.
//!
//! Everything here operates on a bare [`HeaderMap`] so the rules can be
//! tested without building requests. The director wires the request-side
//! functions into its transform pipeline; the engine applies
//! [`strip_response_hop_by_hop`] to upstream responses.

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::header::{AUTHORIZATION, CONNECTION, TE, UPGRADE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "proxy-connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = connection_tokens(headers)
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn connection_tokens(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The protocol named in `Upgrade`, if `Connection` also asks for an upgrade.
#[must_use]
pub fn upgrade_type(headers: &HeaderMap) -> Option<HeaderValue> {
    if !connection_tokens(headers).any(|t| t.eq_ignore_ascii_case("upgrade")) {
        return None;
    }
    headers.get(UPGRADE).cloned()
}

fn restore_upgrade(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, protocol);
}

/// Remove hop-by-hop request headers, including any extra names listed in
/// `Connection`.
///
/// An upgrade handshake keeps `Connection: Upgrade` and its `Upgrade`
/// protocol. `TE` survives only as `TE: trailers`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let upgrade = upgrade_type(headers);
    let wants_trailers = headers
        .get_all(TE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case("trailers"));

    remove_hop_by_hop(headers);

    if wants_trailers {
        headers.insert(TE, HeaderValue::from_static("trailers"));
    }
    if let Some(protocol) = upgrade {
        restore_upgrade(headers, protocol);
    }
}

/// Strip hop-by-hop headers from an upstream response.
///
/// `content-length` is kept: the body is relayed byte-for-byte, so the
/// origin's length stays accurate. A `101 Switching Protocols` keeps its
/// upgrade headers.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap, status: StatusCode) {
    let upgrade = if status == StatusCode::SWITCHING_PROTOCOLS {
        upgrade_type(headers)
    } else {
        None
    };

    remove_hop_by_hop(headers);

    if let Some(protocol) = upgrade {
        restore_upgrade(headers, protocol);
    }
}

/// Collapse repeated `Authorization` values to the first one.
///
/// Zero or one value is left untouched. The lookup is case-insensitive
/// because `HeaderName` is always lowercase.
pub fn collapse_authorization(headers: &mut HeaderMap) {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let Some(first) = values.next().cloned() else {
        return;
    };
    if values.next().is_none() {
        return;
    }
    // insert replaces every existing value
    headers.insert(AUTHORIZATION, first);
}

/// Append `client_ip` to the `X-Forwarded-For` chain, folding any repeated
/// values into one comma-separated header.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let chain = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {client_ip}", prior.join(", "))
    };

    if let Ok(val) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, val);
    }
}
