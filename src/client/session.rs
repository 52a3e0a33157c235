//! Client auth context. Tracks the token pair through a
//! [`TokenRefreshCoordinator`] and caches the last fetched profile so callers
//! can ask "who is signed in" without a network round trip.

use super::{
    backend::{decode_profile, decode_sessions, BackendClient, BackendResponse},
    coordinator::TokenRefreshCoordinator,
    errors::ClientError,
    types::{
        ActiveSessions, Credentials, EmailRequest, LogoutRequest, MessageResponse,
        ResetPasswordRequest, UserProfile, VerifyEmailRequest,
    },
};
use reqwest::Request;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

pub struct AuthSession {
    tokens: TokenRefreshCoordinator,
    profile: RwLock<Option<UserProfile>>,
}

impl AuthSession {
    #[must_use]
    pub fn new(backend: BackendClient) -> Self {
        Self::from_coordinator(TokenRefreshCoordinator::new(backend))
    }

    #[must_use]
    pub fn from_coordinator(tokens: TokenRefreshCoordinator) -> Self {
        Self {
            tokens,
            profile: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_refresh_timeout(self, timeout: Duration) -> Self {
        let profile = self.profile.into_inner().unwrap_or_else(PoisonError::into_inner);
        Self {
            tokens: self.tokens.with_refresh_timeout(timeout),
            profile: RwLock::new(profile),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenRefreshCoordinator {
        &self.tokens
    }

    fn backend(&self) -> &BackendClient {
        self.tokens.backend()
    }

    /// True while a token pair is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.tokens().is_some()
    }

    /// Last profile fetched for this session.
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_profile(&self, profile: Option<UserProfile>) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    fn clear(&self) {
        self.tokens.set_tokens(None);
        self.set_profile(None);
    }

    /// Sign in and hold the returned tokens.
    ///
    /// # Errors
    /// Returns the backend error, or `Malformed` when the backend issued no refresh token.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ClientError> {
        let grant = self.backend().login(credentials).await?;
        let pair = grant
            .into_pair(None)
            .ok_or_else(|| ClientError::Malformed("missing refresh_token".to_string()))?;
        self.tokens.set_tokens(Some(pair));
        self.set_profile(None);
        info!("signed in");
        Ok(())
    }

    /// Register an account; the user still has to verify their email.
    ///
    /// # Errors
    /// Returns the backend error.
    pub async fn register(&self, credentials: &Credentials) -> Result<MessageResponse, ClientError> {
        let response = self.backend().register(credentials).await?;
        Ok(message(&response))
    }

    /// Verify an email code; holds tokens when the backend signs the user in.
    ///
    /// # Errors
    /// Returns the backend error.
    pub async fn verify_email(
        &self,
        request: &VerifyEmailRequest,
    ) -> Result<MessageResponse, ClientError> {
        let (response, grant) = self.backend().verify_email(request).await?;
        if let Some(pair) = grant.and_then(|grant| grant.into_pair(None)) {
            self.tokens.set_tokens(Some(pair));
            self.set_profile(None);
        }
        Ok(message(&response))
    }

    /// # Errors
    /// Returns the backend error.
    pub async fn resend_code(&self, request: &EmailRequest) -> Result<MessageResponse, ClientError> {
        let response = self.backend().resend_code(request).await?;
        Ok(message(&response))
    }

    /// # Errors
    /// Returns the backend error.
    pub async fn forgot_password(
        &self,
        request: &EmailRequest,
    ) -> Result<MessageResponse, ClientError> {
        let response = self.backend().forgot_password(request).await?;
        Ok(message(&response))
    }

    /// # Errors
    /// Returns the backend error.
    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<MessageResponse, ClientError> {
        let response = self.backend().reset_password(request).await?;
        Ok(message(&response))
    }

    /// Fetch `/api/me`, refreshing once on 401. A final 401 ends the session.
    ///
    /// # Errors
    /// Returns `Unauthorized` when the session cannot be recovered.
    pub async fn refresh_profile(&self) -> Result<UserProfile, ClientError> {
        let request = self.backend().profile_request()?;
        let response = self.send_authorized(request).await?;
        match decode_profile(response) {
            Ok(profile) => {
                self.set_profile(Some(profile.clone()));
                Ok(profile)
            }
            Err(err) => Err(self.on_authorized_error(err)),
        }
    }

    /// List the active sessions of the current user.
    ///
    /// # Errors
    /// Returns `Unauthorized` when the session cannot be recovered.
    pub async fn sessions(&self) -> Result<ActiveSessions, ClientError> {
        let request = self.backend().sessions_request()?;
        let response = self.send_authorized(request).await?;
        decode_sessions(response).map_err(|err| self.on_authorized_error(err))
    }

    /// Sign out. Local state is cleared even when the backend call fails.
    ///
    /// # Errors
    /// Returns the backend error after local state has been cleared.
    pub async fn logout(&self, logout_all: bool) -> Result<MessageResponse, ClientError> {
        let access_token = self.tokens.access_token();
        let refresh_token = self.tokens.refresh_token();
        let result = self
            .backend()
            .logout(
                access_token.as_ref(),
                refresh_token.as_ref(),
                LogoutRequest { logout_all },
            )
            .await;
        self.clear();
        match result {
            Ok(response) => Ok(message(&response)),
            Err(err) => {
                warn!("Backend logout failed, local session cleared anyway: {err}");
                Err(err)
            }
        }
    }

    async fn send_authorized(&self, request: Request) -> Result<BackendResponse, ClientError> {
        let response = self.tokens.authorized_fetch(request).await?;
        BackendResponse::read(response).await
    }

    fn on_authorized_error(&self, err: ClientError) -> ClientError {
        if matches!(err, ClientError::Unauthorized) {
            self.clear();
        }
        err
    }
}

fn message(response: &BackendResponse) -> MessageResponse {
    response.json().unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::{backend::DEFAULT_REQUEST_TIMEOUT, types::TokenPair};
    use anyhow::Result;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn session(server: &MockServer) -> AuthSession {
        AuthSession::new(BackendClient::new(&server.uri(), DEFAULT_REQUEST_TIMEOUT).unwrap())
    }

    #[tokio::test]
    async fn login_then_expired_profile_refreshes_and_succeeds() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "a@b.com", "password": "secret123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refresh_token": "refresh-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "refresh_token": "refresh-2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .and(header("authorization", "Bearer access-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "u1", "email": "a@b.com" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = session(&server);
        session
            .login(&Credentials {
                email: "a@b.com".to_string(),
                password: "secret123".to_string(),
            })
            .await?;
        assert_eq!(
            session.tokens().access_token().unwrap().expose_secret(),
            "access-1"
        );

        let profile = session.refresh_profile().await?;
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.email, "a@b.com");
        assert_eq!(session.current_user(), Some(profile));
        assert_eq!(
            session.tokens().access_token().unwrap().expose_secret(),
            "access-2"
        );
        Ok(())
    }

    #[tokio::test]
    async fn unrecoverable_profile_clears_session() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "bad" })))
            .mount(&server)
            .await;

        let session = session(&server);
        session
            .tokens()
            .set_tokens(Some(TokenPair::new("access-1", "refresh-1")));
        let result = session.refresh_profile().await;
        assert!(matches!(result, Err(ClientError::Unauthorized)));
        assert!(!session.is_authenticated());
        assert!(session.current_user().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_on_backend_failure() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(body_json(json!({ "logout_all": true })))
            .and(header("authorization", "Bearer access-1"))
            .and(header("cookie", "accessToken=access-1; refreshToken=refresh-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let session = session(&server);
        session
            .tokens()
            .set_tokens(Some(TokenPair::new("access-1", "refresh-1")));
        let result = session.logout(true).await;
        assert!(result.is_err());
        assert!(!session.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn sessions_present_access_cookie() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/sessions"))
            .and(header("cookie", "accessToken=access-1; refreshToken=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_session_id": "s1",
                "total_sessions": 2,
                "sessions": [{ "id": "s1" }, { "id": "s2" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/sessions"))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(10)
            .mount(&server)
            .await;

        let session = session(&server);
        session
            .tokens()
            .set_tokens(Some(TokenPair::new("access-1", "refresh-1")));
        let sessions = session.sessions().await?;
        assert_eq!(sessions.current_session_id, "s1");
        assert_eq!(sessions.total_sessions, 2);
        Ok(())
    }

    #[tokio::test]
    async fn register_does_not_authenticate() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "message": "Check your inbox"
            })))
            .mount(&server)
            .await;

        let session = session(&server);
        let message = session
            .register(&Credentials {
                email: "a@b.com".to_string(),
                password: "secret123".to_string(),
            })
            .await?;
        assert_eq!(message.message.as_deref(), Some("Check your inbox"));
        assert!(!session.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_with_tokens_authenticates() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify-email"))
            .and(body_json(json!({ "email": "a@b.com", "code": "123456" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-v",
                "refresh_token": "refresh-v"
            })))
            .mount(&server)
            .await;

        let session = session(&server);
        session
            .verify_email(&VerifyEmailRequest {
                email: "a@b.com".to_string(),
                code: "123456".to_string(),
            })
            .await?;
        assert!(session.is_authenticated());
        Ok(())
    }
}
