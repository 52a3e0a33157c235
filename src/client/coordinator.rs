//! Single-flight token refresh and the authenticated-request retry path.
//!
//! The coordinator owns one access/refresh pair. Any number of concurrent
//! callers asking for a refresh share one backend call: the first caller
//! becomes the leader and performs it, later callers subscribe a one-shot
//! waiter and receive the leader's outcome in subscription order. `None` is
//! the only failure signal and means "re-authenticate".
//!
//! The lock is a plain `std::sync::Mutex` and is never held across an
//! `.await`; suspension only happens on network I/O.

use super::{
    backend::{attach_credentials, BackendClient},
    errors::ClientError,
    types::TokenPair,
};
use reqwest::{Request, Response, StatusCode};
use secrecy::SecretString;
use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Default bound on a single backend refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

type Waiter = oneshot::Sender<Option<SecretString>>;

enum Role {
    /// Refresh token to present and the token generation it was read from.
    Leader(SecretString, u64),
    Follower(oneshot::Receiver<Option<SecretString>>),
}

#[derive(Default)]
struct TokenState {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
    /// Bumped on every replacement of the held tokens.
    generation: u64,
    /// `Some` exactly while a refresh is in flight; holds the callers queued behind it.
    waiters: Option<Vec<Waiter>>,
}

pub struct TokenRefreshCoordinator {
    backend: BackendClient,
    refresh_timeout: Duration,
    state: Mutex<TokenState>,
}

impl std::fmt::Debug for TokenRefreshCoordinator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("TokenRefreshCoordinator")
            .field("backend", self.backend.base_url())
            .field("refresh_timeout", &self.refresh_timeout)
            .field("has_access_token", &state.access.is_some())
            .field("has_refresh_token", &state.refresh.is_some())
            .field("refreshing", &state.waiters.is_some())
            .field("waiting", &state.waiters.as_ref().map_or(0, Vec::len))
            .finish()
    }
}

/// Releases the in-flight marker when the leader finishes or is dropped.
struct InFlight<'a> {
    coordinator: &'a TokenRefreshCoordinator,
    generation: u64,
    completed: bool,
}

impl InFlight<'_> {
    fn complete(mut self, tokens: Option<TokenPair>) -> Option<SecretString> {
        self.completed = true;
        let (result, waiters) = {
            let mut state = self.coordinator.lock();
            let result = if state.generation == self.generation {
                let result = tokens.as_ref().map(|pair| pair.access_token.clone());
                state.store(tokens);
                result
            } else {
                // Tokens were replaced or cleared mid-refresh; that decision wins.
                debug!("discarding refresh outcome for superseded tokens");
                None
            };
            (result, state.waiters.take().unwrap_or_default())
        };
        notify(waiters, result.as_ref());
        result
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // Leader was cancelled mid-refresh: keep the tokens, release the waiters.
        let waiters = self.coordinator.lock().waiters.take().unwrap_or_default();
        warn!(waiters = waiters.len(), "refresh abandoned before completion");
        notify(waiters, None);
    }
}

impl TokenState {
    fn store(&mut self, tokens: Option<TokenPair>) {
        self.generation = self.generation.wrapping_add(1);
        match tokens {
            Some(pair) => {
                self.access = Some(pair.access_token);
                self.refresh = Some(pair.refresh_token);
            }
            None => {
                self.access = None;
                self.refresh = None;
            }
        }
    }
}

fn notify(waiters: Vec<Waiter>, token: Option<&SecretString>) {
    for waiter in waiters {
        // A waiter that stopped listening is not an error.
        let _ = waiter.send(token.cloned());
    }
}

impl TokenRefreshCoordinator {
    #[must_use]
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            state: Mutex::new(TokenState::default()),
        }
    }

    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tokens(self, tokens: Option<TokenPair>) -> Self {
        self.set_tokens(tokens);
        self
    }

    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.lock().access.clone()
    }

    /// Current refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.lock().refresh.clone()
    }

    /// Current token pair, when both tokens are held.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        let state = self.lock();
        Some(TokenPair {
            access_token: state.access.clone()?,
            refresh_token: state.refresh.clone()?,
        })
    }

    /// Replace the held pair; `None` is a local logout.
    ///
    /// A refresh still in flight when this is called does not overwrite the
    /// new state; its callers receive `None`.
    pub fn set_tokens(&self, tokens: Option<TokenPair>) {
        self.lock().store(tokens);
    }

    /// Seed tokens from a session store where either token may already be gone,
    /// e.g. an access cookie that expired before its refresh cookie.
    pub fn restore(&self, access: Option<SecretString>, refresh: Option<SecretString>) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.access = access;
        state.refresh = refresh;
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().waiters.is_some()
    }

    /// Callers queued behind the refresh in flight.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.as_ref().map_or(0, Vec::len)
    }

    /// Obtain a fresh access token, sharing any refresh already in flight.
    ///
    /// Returns `None` when no refresh token is held or the refresh failed; a
    /// failed refresh also clears the held tokens.
    pub async fn refresh_access_token(&self) -> Option<SecretString> {
        let role = {
            let mut state = self.lock();
            if let Some(waiters) = state.waiters.as_mut() {
                let (sender, receiver) = oneshot::channel();
                waiters.push(sender);
                Role::Follower(receiver)
            } else {
                let refresh_token = state.refresh.clone()?;
                state.waiters = Some(Vec::new());
                Role::Leader(refresh_token, state.generation)
            }
        };

        let (refresh_token, generation) = match role {
            Role::Follower(receiver) => {
                debug!("joining in-flight refresh");
                return receiver.await.unwrap_or(None);
            }
            Role::Leader(refresh_token, generation) => (refresh_token, generation),
        };

        let in_flight = InFlight {
            coordinator: self,
            generation,
            completed: false,
        };

        let outcome = tokio::time::timeout(
            self.refresh_timeout,
            self.backend.refresh(&refresh_token),
        )
        .await;

        let tokens = match outcome {
            Ok(Ok(grant)) => {
                let pair = grant.into_pair(Some(refresh_token));
                if pair.is_some() {
                    debug!("access token refreshed");
                }
                pair
            }
            Ok(Err(ClientError::Upstream { status, .. })) => {
                warn!(%status, "refresh rejected, clearing session");
                None
            }
            Ok(Err(err)) => {
                error!("Refresh failed, clearing session: {err}");
                None
            }
            Err(_) => {
                error!(
                    timeout_ms = self.refresh_timeout.as_millis(),
                    "Refresh timed out, clearing session"
                );
                None
            }
        };

        in_flight.complete(tokens)
    }

    /// Send `request` with the held tokens, refreshing and retrying once on 401.
    ///
    /// The access token goes out as a bearer header; both tokens also go out as
    /// the `accessToken`/`refreshToken` cookies the backend reads.
    ///
    /// # Errors
    /// Returns an error only when the request cannot be sent; HTTP failures,
    /// including a final 401, are returned as the response.
    pub async fn authorized_fetch(&self, request: Request) -> Result<Response, ClientError> {
        let retry = request.try_clone();
        let response = self.send_with_token(request, self.access_token()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let has_refresh_token = self.lock().refresh.is_some();
        if !has_refresh_token {
            return Ok(response);
        }
        let Some(retry) = retry else {
            warn!("request body cannot be replayed, not retrying after 401");
            return Ok(response);
        };
        let Some(token) = self.refresh_access_token().await else {
            return Ok(response);
        };

        debug!(url = %retry.url(), "retrying request with refreshed token");
        self.send_with_token(retry, Some(token)).await
    }

    async fn send_with_token(
        &self,
        mut request: Request,
        token: Option<SecretString>,
    ) -> Result<Response, ClientError> {
        let refresh = self.refresh_token();
        attach_credentials(&mut request, token.as_ref(), refresh.as_ref())?;
        self.backend.execute(request).await
    }
}
