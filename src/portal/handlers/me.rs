//! Authenticated proxy routes. Each request gets its own
//! [`TokenRefreshCoordinator`] seeded from its cookies, so one browser's tokens
//! never serve another's request.

use super::{relay, types::ErrorBody};
use crate::{
    client::{
        backend::{decode_profile, decode_sessions},
        types::{ActiveSessions, UserProfile},
        BackendClient, BackendResponse, ClientError, TokenRefreshCoordinator,
    },
    portal::{config::PortalConfig, cookies, error::ProxyError},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Request;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the signed-in user"),
        (status = 401, description = "Session missing or expired; cookies cleared", body = ErrorBody),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn me(config: Extension<Arc<PortalConfig>>, headers: HeaderMap) -> Response {
    forward(&config, &headers, BackendClient::profile_request, |response| {
        decode_profile(response).map(|profile: UserProfile| Json(profile).into_response())
    })
    .await
}

#[utoipa::path(
    get,
    path = "/api/auth/sessions",
    responses(
        (status = 200, description = "Active sessions of the signed-in user"),
        (status = 401, description = "Session missing or expired; cookies cleared", body = ErrorBody),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn sessions(config: Extension<Arc<PortalConfig>>, headers: HeaderMap) -> Response {
    forward(&config, &headers, BackendClient::sessions_request, |response| {
        decode_sessions(response).map(|sessions: ActiveSessions| Json(sessions).into_response())
    })
    .await
}

/// Send an authenticated request through a per-request coordinator.
///
/// Rotated tokens are written back as cookies. A final 401 is relayed and both
/// cookies are cleared.
async fn forward<B, D>(
    config: &PortalConfig,
    headers: &HeaderMap,
    build: B,
    decode: D,
) -> Response
where
    B: FnOnce(&BackendClient) -> Result<Request, ClientError>,
    D: FnOnce(BackendResponse) -> Result<Response, ClientError>,
{
    let (access, refresh) = cookies::session_tokens(headers);
    if access.is_none() && refresh.is_none() {
        return ProxyError::AuthExpired.into_response();
    }

    let coordinator = TokenRefreshCoordinator::new(config.backend().clone())
        .with_refresh_timeout(config.refresh_timeout());
    coordinator.restore(access.clone(), refresh);

    let result = async {
        let request = build(config.backend())?;
        let response = coordinator.authorized_fetch(request).await?;
        BackendResponse::read(response).await
    }
    .await;

    let mut response = match result {
        Ok(backend) if backend.status == StatusCode::UNAUTHORIZED => relay(backend),
        Ok(backend) => decode(backend).unwrap_or_else(|err| ProxyError::from(err).into_response()),
        Err(err) => ProxyError::from(err).into_response(),
    };

    if response.status() == StatusCode::UNAUTHORIZED {
        debug!("session expired, clearing cookies");
        cookies::clear_session(response.headers_mut(), config);
    } else if let Some(tokens) = coordinator.tokens() {
        if rotated(access.as_ref(), &tokens.access_token) {
            debug!("session refreshed, rewriting cookies");
            cookies::set_session(response.headers_mut(), config, &tokens);
        }
    }
    response
}

fn rotated(previous: Option<&SecretString>, current: &SecretString) -> bool {
    previous.map_or(true, |previous| {
        previous.expose_secret() != current.expose_secret()
    })
}
