//! Proxy routes for sign-in, registration, email verification, password
//! reset, refresh and logout.
//!
//! Tokens issued by the backend never reach the browser body; they are stored
//! in `HttpOnly` cookies and only a short acknowledgement is returned.

use super::{
    parse_body, relay, required, required_email,
    types::{
        CredentialsBody, EmailBody, ErrorBody, LogoutBody, LogoutResponse, ResetPasswordBody,
        SessionGranted, VerifyEmailBody,
    },
};
use crate::{
    client::{
        backend::LOGOUT_PATH,
        types::{
            Credentials, EmailRequest, LogoutRequest, ResetPasswordRequest, VerifyEmailRequest,
        },
        BackendResponse, ClientError, TokenGrant, TokenPair, TokenRefreshCoordinator,
    },
    portal::{config::PortalConfig, cookies, error::ProxyError},
};
use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Session acknowledgement with both token cookies set.
fn granted(
    config: &PortalConfig,
    message: &str,
    tokens: &TokenPair,
    expires_in: Option<i64>,
) -> Response {
    let mut headers = HeaderMap::new();
    cookies::set_session(&mut headers, config, tokens);
    let body = SessionGranted {
        message: message.to_string(),
        expires_in,
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}

fn session_pair(grant: TokenGrant) -> Result<(TokenPair, Option<i64>), ProxyError> {
    let expires_in = grant.expires_in;
    let pair = grant
        .into_pair(None)
        .ok_or_else(|| ProxyError::BadGateway("missing refresh_token".to_string()))?;
    Ok((pair, expires_in))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsBody,
    responses(
        (status = 200, description = "Signed in, session cookies set", body = SessionGranted),
        (status = 400, description = "Missing or invalid field", body = ErrorBody),
        (status = 401, description = "Invalid credentials, relayed from the backend"),
        (status = 500, description = "Backend unreachable", body = ErrorBody),
        (status = 502, description = "Malformed backend response", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: CredentialsBody = parse_body(&body)?;
    let credentials = Credentials {
        email: required_email(request.email)?,
        password: required("password", request.password)?,
    };

    let grant = config.backend().login(&credentials).await?;
    let (pair, expires_in) = session_pair(grant)?;

    info!("Login succeeded");
    Ok(granted(&config, "Login successful", &pair, expires_in))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsBody,
    responses(
        (status = 201, description = "Account created, verification code sent"),
        (status = 400, description = "Missing or invalid field", body = ErrorBody),
        (status = 409, description = "Email already registered, relayed from the backend"),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: CredentialsBody = parse_body(&body)?;
    let credentials = Credentials {
        email: required_email(request.email)?,
        password: required("password", request.password)?,
    };
    let response = config.backend().register(&credentials).await?;
    Ok(relay(response))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailBody,
    responses(
        (status = 200, description = "Email verified; cookies set when the backend signs the user in"),
        (status = 400, description = "Missing field or invalid code"),
        (status = 500, description = "Backend unreachable", body = ErrorBody),
        (status = 502, description = "Token grant without a refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: VerifyEmailBody = parse_body(&body)?;
    let request = VerifyEmailRequest {
        email: required_email(request.email)?,
        code: required("code", request.code)?.trim().to_string(),
    };

    let (response, grant) = config.backend().verify_email(&request).await?;
    match grant {
        // A grant without its refresh token must not leak through the relay.
        Some(grant) => {
            let (pair, expires_in) = session_pair(grant)?;
            Ok(granted(&config, "Email verified", &pair, expires_in))
        }
        None => Ok(relay(response)),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-code",
    request_body = EmailBody,
    responses(
        (status = 200, description = "Verification code sent"),
        (status = 400, description = "Missing or invalid email", body = ErrorBody),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn resend_code(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: EmailBody = parse_body(&body)?;
    let request = EmailRequest {
        email: required_email(request.email)?,
    };
    Ok(relay(config.backend().resend_code(&request).await?))
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = EmailBody,
    responses(
        (status = 200, description = "Reset code sent if the account exists"),
        (status = 400, description = "Missing or invalid email", body = ErrorBody),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: EmailBody = parse_body(&body)?;
    let request = EmailRequest {
        email: required_email(request.email)?,
    };
    Ok(relay(config.backend().forgot_password(&request).await?))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordBody,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Missing field or invalid code"),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    config: Extension<Arc<PortalConfig>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: ResetPasswordBody = parse_body(&body)?;
    let request = ResetPasswordRequest {
        email: required_email(request.email)?,
        code: required("code", request.code)?.trim().to_string(),
        new_password: required("new_password", request.new_password)?,
    };
    Ok(relay(config.backend().reset_password(&request).await?))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Session renewed, cookies rewritten", body = SessionGranted),
        (status = 401, description = "No refresh cookie or refresh rejected; cookies cleared"),
        (status = 500, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(config: Extension<Arc<PortalConfig>>, headers: HeaderMap) -> Response {
    let (_, refresh_token) = cookies::session_tokens(&headers);
    let Some(refresh_token) = refresh_token else {
        return expired(&config, ProxyError::AuthExpired);
    };

    match config.backend().refresh(&refresh_token).await {
        Ok(grant) => {
            let expires_in = grant.expires_in;
            match grant.into_pair(Some(refresh_token)) {
                Some(pair) => granted(&config, "Token refreshed", &pair, expires_in),
                None => ProxyError::BadGateway("missing refresh_token".to_string()).into_response(),
            }
        }
        // A rejected refresh token is useless; drop the cookies with it.
        Err(err @ ClientError::Upstream { status, .. }) if status.is_client_error() => {
            expired(&config, err.into())
        }
        Err(err) => ProxyError::from(err).into_response(),
    }
}

fn expired(config: &PortalConfig, error: ProxyError) -> Response {
    let mut response = error.into_response();
    cookies::clear_session(response.headers_mut(), config);
    response
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutBody,
    responses(
        (status = 200, description = "Signed out; cookies always cleared", body = LogoutResponse),
        (status = 500, description = "Backend unreachable; cookies still cleared", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(
    config: Extension<Arc<PortalConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut response = match parse_body::<LogoutBody>(&body) {
        Ok(request) => revoke(&config, &headers, request.logout_all).await,
        Err(err) => err.into_response(),
    };
    // Always clear the cookies, even if the backend call failed.
    cookies::clear_session(response.headers_mut(), &config);
    response
}

async fn revoke(config: &PortalConfig, headers: &HeaderMap, logout_all: bool) -> Response {
    let (access, refresh) = cookies::session_tokens(headers);
    if access.is_none() && refresh.is_none() {
        let body = LogoutResponse {
            message: "Logged out".to_string(),
            sessions_revoked: None,
        };
        return (StatusCode::OK, Json(body)).into_response();
    }

    // Through the coordinator so an expired access cookie still revokes the session.
    let coordinator = TokenRefreshCoordinator::new(config.backend().clone())
        .with_refresh_timeout(config.refresh_timeout());
    coordinator.restore(access, refresh);

    let result = async {
        let request =
            config
                .backend()
                .request(Method::POST, LOGOUT_PATH, Some(&LogoutRequest { logout_all }))?;
        let response = coordinator.authorized_fetch(request).await?;
        BackendResponse::read(response).await
    }
    .await;

    match result {
        Ok(response) => {
            if response.status.is_success() {
                info!(logout_all, "Logout succeeded");
            } else {
                warn!(status = %response.status, "Backend logout failed");
            }
            relay(response)
        }
        Err(err) => ProxyError::from(err).into_response(),
    }
}
