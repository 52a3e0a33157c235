//! HTTP client for the Backend Auth Service. Every call carries the crate user
//! agent and a request timeout; token values are never logged.

use super::{
    errors::ClientError,
    types::{
        ActiveSessions, Credentials, EmailRequest, LogoutRequest, RefreshRequest,
        ResetPasswordRequest, TokenGrant, UserProfile, VerifyEmailRequest, ACCESS_TOKEN_COOKIE,
        REFRESH_TOKEN_COOKIE,
    },
};
use crate::APP_USER_AGENT;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    Client, Method, Request, Response, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const VERIFY_EMAIL_PATH: &str = "/auth/verify-email";
pub const RESEND_CODE_PATH: &str = "/auth/resend-code";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const SESSIONS_PATH: &str = "/auth/sessions";
pub const PROFILE_PATH: &str = "/api/me";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw backend answer, kept so proxy routes can relay it verbatim.
#[derive(Clone, Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    /// Read status, content type, `Set-Cookie` values and body.
    ///
    /// # Errors
    /// Returns `ClientError::Transport` if the body cannot be read.
    pub async fn read(response: Response) -> Result<Self, ClientError> {
        let status = response.status();
        let content_type = header_string(response.headers(), CONTENT_TYPE.as_str());
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            content_type,
            set_cookies,
            body,
        })
    }

    /// Turn non-2xx answers into `ClientError::Upstream`.
    ///
    /// # Errors
    /// Returns `ClientError::Upstream` carrying status and body.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Upstream {
                status: self.status,
                content_type: self.content_type,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }

    /// Decode a token grant from this response.
    ///
    /// # Errors
    /// Returns `ClientError::Malformed` when no access token can be found.
    pub fn token_grant(&self) -> Result<TokenGrant, ClientError> {
        TokenGrant::from_response(&self.body, self.set_cookies.iter().map(String::as_str))
    }

    /// Decode the JSON body.
    ///
    /// # Errors
    /// Returns `ClientError::Malformed` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| ClientError::Malformed(format!("response body: {err}")))
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Typed access to the Backend Auth Service.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client for `base_url` with the given per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|err| ClientError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a backend path against the base URL, keeping any base path prefix.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidUrl` if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, path.trim().trim_start_matches('/'));
        Url::parse(&joined).map_err(|err| ClientError::InvalidUrl(format!("{joined}: {err}")))
    }

    /// Build a request for `path`, optionally with a JSON body.
    ///
    /// # Errors
    /// Returns an error if the URL or the body cannot be encoded.
    pub fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Request, ClientError> {
        let mut builder = self.http.request(method, self.endpoint(path)?);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    /// Send a prepared request.
    ///
    /// # Errors
    /// Returns `ClientError::Timeout` or `ClientError::Transport` on network failure.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        self.http.execute(request).await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Transport(err)
            }
        })
    }

    /// POST a JSON body and read the whole answer, whatever its status.
    ///
    /// # Errors
    /// Returns an error only on transport failure.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        access: Option<&SecretString>,
        refresh: Option<&SecretString>,
    ) -> Result<BackendResponse, ClientError> {
        let mut request = self.request(Method::POST, path, Some(body))?;
        attach_credentials(&mut request, access, refresh)?;
        let response = self.execute(request).await?;
        BackendResponse::read(response).await
    }

    #[instrument(skip(self, credentials), fields(backend = %self.base_url))]
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, ClientError> {
        let response = self
            .post_json(LOGIN_PATH, credentials, None, None)
            .await?
            .error_for_status()?;
        response.token_grant()
    }

    #[instrument(skip(self, credentials), fields(backend = %self.base_url))]
    pub async fn register(&self, credentials: &Credentials) -> Result<BackendResponse, ClientError> {
        self.post_json(REGISTER_PATH, credentials, None, None)
            .await?
            .error_for_status()
    }

    /// Verify an email code. Returns the raw answer and a grant when the backend
    /// signs the user in directly.
    #[instrument(skip(self, request), fields(backend = %self.base_url))]
    pub async fn verify_email(
        &self,
        request: &VerifyEmailRequest,
    ) -> Result<(BackendResponse, Option<TokenGrant>), ClientError> {
        let response = self
            .post_json(VERIFY_EMAIL_PATH, request, None, None)
            .await?
            .error_for_status()?;
        let grant = response.token_grant().ok();
        Ok((response, grant))
    }

    #[instrument(skip(self, request), fields(backend = %self.base_url))]
    pub async fn resend_code(&self, request: &EmailRequest) -> Result<BackendResponse, ClientError> {
        self.post_json(RESEND_CODE_PATH, request, None, None)
            .await?
            .error_for_status()
    }

    #[instrument(skip(self, request), fields(backend = %self.base_url))]
    pub async fn forgot_password(
        &self,
        request: &EmailRequest,
    ) -> Result<BackendResponse, ClientError> {
        self.post_json(FORGOT_PASSWORD_PATH, request, None, None)
            .await?
            .error_for_status()
    }

    #[instrument(skip(self, request), fields(backend = %self.base_url))]
    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<BackendResponse, ClientError> {
        self.post_json(RESET_PASSWORD_PATH, request, None, None)
            .await?
            .error_for_status()
    }

    /// Exchange a refresh token for a new grant. The token travels both in the
    /// body and as the `refreshToken` cookie the backend reads it from.
    #[instrument(skip(self, refresh_token), fields(backend = %self.base_url))]
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, ClientError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        };
        let response = self
            .post_json(REFRESH_PATH, &body, None, Some(refresh_token))
            .await?
            .error_for_status()?;
        let grant = response.token_grant()?;
        debug!(rotated = grant.refresh_token.is_some(), "refresh succeeded");
        Ok(grant)
    }

    #[instrument(skip(self, access_token, refresh_token), fields(backend = %self.base_url))]
    pub async fn logout(
        &self,
        access_token: Option<&SecretString>,
        refresh_token: Option<&SecretString>,
        request: LogoutRequest,
    ) -> Result<BackendResponse, ClientError> {
        self.post_json(LOGOUT_PATH, &request, access_token, refresh_token)
            .await?
            .error_for_status()
    }

    /// Build the profile request; callers send it through the coordinator.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be built.
    pub fn profile_request(&self) -> Result<Request, ClientError> {
        self.request::<()>(Method::GET, PROFILE_PATH, None)
    }

    /// Build the active-sessions request; callers send it through the coordinator.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be built.
    pub fn sessions_request(&self) -> Result<Request, ClientError> {
        self.request::<()>(Method::GET, SESSIONS_PATH, None)
    }

    /// Check that the backend answers at all.
    pub async fn ping(&self) -> bool {
        match self.http.get(self.base_url.clone()).send().await {
            Ok(_) => true,
            Err(err) => {
                debug!("Backend ping failed: {err}");
                false
            }
        }
    }
}

/// Decode a profile answer.
///
/// # Errors
/// Returns `Unauthorized` on 401, `Upstream` on other failures.
pub fn decode_profile(response: BackendResponse) -> Result<UserProfile, ClientError> {
    decode_authorized(response)
}

/// Decode an active-sessions answer.
///
/// # Errors
/// Returns `Unauthorized` on 401, `Upstream` on other failures.
pub fn decode_sessions(response: BackendResponse) -> Result<ActiveSessions, ClientError> {
    decode_authorized(response)
}

fn decode_authorized<T: DeserializeOwned>(response: BackendResponse) -> Result<T, ClientError> {
    if response.status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    response.error_for_status()?.json()
}

fn sensitive_value(value: &str) -> Result<HeaderValue, ClientError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| ClientError::Malformed("token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Set `Authorization: Bearer <token>` on a request.
///
/// # Errors
/// Returns `ClientError::Malformed` if the token is not a valid header value.
pub fn attach_bearer(request: &mut Request, token: &SecretString) -> Result<(), ClientError> {
    let value = sensitive_value(&format!("Bearer {}", token.expose_secret()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Present the held tokens the way the backend reads them: the access token
/// as a bearer header, and both tokens as `accessToken`/`refreshToken` cookies.
///
/// These cookies only travel portal to backend; nothing here reaches a browser.
///
/// # Errors
/// Returns `ClientError::Malformed` if a token is not a valid header value.
pub fn attach_credentials(
    request: &mut Request,
    access: Option<&SecretString>,
    refresh: Option<&SecretString>,
) -> Result<(), ClientError> {
    if let Some(token) = access {
        attach_bearer(request, token)?;
    }

    let cookie = [(ACCESS_TOKEN_COOKIE, access), (REFRESH_TOKEN_COOKIE, refresh)]
        .into_iter()
        .filter_map(|(name, token)| token.map(|token| format!("{name}={}", token.expose_secret())))
        .collect::<Vec<_>>()
        .join("; ");
    if cookie.is_empty() {
        request.headers_mut().remove(COOKIE);
    } else {
        request.headers_mut().insert(COOKIE, sensitive_value(&cookie)?);
    }
    Ok(())
}
