//! Client side of the Backend Auth Service: typed endpoints, the single-flight
//! token refresh coordinator, and the auth session context built on top of it.
//!
//! Flow Overview: `AuthSession::login` stores the token pair in the
//! coordinator. Authenticated calls go through
//! `TokenRefreshCoordinator::authorized_fetch`, which refreshes at most once
//! per 401 and shares that refresh with every concurrent caller. A failed
//! refresh clears the tokens; callers treat `None`/`Unauthorized` as "sign in
//! again". Token values live in `SecretString` and must never be logged.

pub mod backend;
pub mod coordinator;
pub mod errors;
pub mod session;
pub mod types;

pub use backend::{BackendClient, BackendResponse};
pub use coordinator::TokenRefreshCoordinator;
pub use errors::ClientError;
pub use session::AuthSession;
pub use types::{TokenGrant, TokenPair, UserProfile};
