//! Session cookies written by the portal. Token cookies are always `HttpOnly`.

use super::config::PortalConfig;
use crate::client::{
    types::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    TokenPair,
};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::error;

/// Read a cookie value from every `Cookie` header of the request.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Access and refresh cookies of the request, either may be missing.
pub fn session_tokens(headers: &HeaderMap) -> (Option<SecretString>, Option<SecretString>) {
    (
        read(headers, ACCESS_TOKEN_COOKIE).map(SecretString::from),
        read(headers, REFRESH_TOKEN_COOKIE).map(SecretString::from),
    )
}

pub fn has_access_token(headers: &HeaderMap) -> bool {
    read(headers, ACCESS_TOKEN_COOKIE).is_some()
}

fn cookie(
    config: &PortalConfig,
    name: &str,
    value: &str,
    max_age: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Append `Set-Cookie` headers storing both tokens.
pub fn set_session(headers: &mut HeaderMap, config: &PortalConfig, tokens: &TokenPair) {
    let cookies = [
        cookie(
            config,
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.expose_secret(),
            config.access_token_max_age(),
        ),
        cookie(
            config,
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.expose_secret(),
            config.refresh_token_max_age(),
        ),
    ];
    append(headers, cookies);
}

/// Append `Set-Cookie` headers expiring both tokens.
pub fn clear_session(headers: &mut HeaderMap, config: &PortalConfig) {
    let cookies = [
        cookie(config, ACCESS_TOKEN_COOKIE, "", 0),
        cookie(config, REFRESH_TOKEN_COOKIE, "", 0),
    ];
    append(headers, cookies);
}

fn append(
    headers: &mut HeaderMap,
    cookies: impl IntoIterator<Item = Result<HeaderValue, InvalidHeaderValue>>,
) {
    for cookie in cookies {
        match cookie {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            // Tokens with characters not allowed in a header are dropped.
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }
}
