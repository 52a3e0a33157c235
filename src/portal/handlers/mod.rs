//! Portal route handlers and the input checks they share.
//!
//! Proxy handlers validate their input before contacting the backend, so a
//! missing field never costs a round trip.

pub mod auth;
pub mod health;
pub mod me;
pub mod pages;
pub mod types;

use super::error::ProxyError;
use crate::client::BackendResponse;
use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::de::DeserializeOwned;

/// Lightweight email sanity check; the backend owns the real rules.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Required, normalized and plausible email.
pub(crate) fn required_email(email: Option<String>) -> Result<String, ProxyError> {
    let email = normalize_email(&required("email", email)?);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(ProxyError::invalid("Invalid email address"))
    }
}

/// Required non-blank field. Secrets are passed through untrimmed.
pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, ProxyError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProxyError::missing(field)),
    }
}

/// Decode a JSON body; an empty body decodes as `T::default()`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ProxyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ProxyError::invalid("Invalid JSON body"))
}

/// Relay a backend answer: status, content type and body. Backend
/// `Set-Cookie` headers are dropped; the portal writes its own cookies.
pub(crate) fn relay(backend: BackendResponse) -> Response {
    let mut response = (backend.status, backend.body).into_response();
    match backend
        .content_type
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        Some(value) => {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    response
}
