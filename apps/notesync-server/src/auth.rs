//! Pull sync credentials out of request headers.
//!
//! Anything we cannot decode is still handed to the authentication processor so the
//! client gets a validation payload instead of a transport error.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine};
use serde_json::{json, Map, Value};

pub const AUTH_HEADER: &str = "x-notesync-auth";

/// Credentials as a JSON mapping: Basic auth first, then `X-Notesync-Auth`, else `{}`.
pub fn credentials_from_headers(headers: &HeaderMap) -> Value {
    if let Some(raw) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(encoded) = raw.strip_prefix("Basic ").or_else(|| raw.strip_prefix("basic ")) {
            return basic_credentials(encoded.trim());
        }
    }
    if let Some(raw) = headers.get(AUTH_HEADER) {
        return raw
            .to_str()
            .ok()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);
    }
    Value::Object(Map::new())
}

fn basic_credentials(encoded: &str) -> Value {
    let decoded = BASE64_STD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    match decoded.as_deref().and_then(|s| s.split_once(':')) {
        Some((username, password)) => json!({"username": username, "password": password}),
        None => Value::Null,
    }
}
