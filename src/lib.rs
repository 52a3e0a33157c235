//! # Authportal (browser-facing authentication portal)
//!
//! `authportal` is the browser-facing half of an authentication system. Every
//! security decision (password hashing, token issuance, verification codes,
//! session revocation) belongs to an external Backend Auth Service; this crate
//! only forwards, relays, and coordinates.
//!
//! ## Session transport
//!
//! - **Browser ↔ portal:** `HttpOnly` cookies named `accessToken` and
//!   `refreshToken`, written only by the portal. Scripts never see tokens.
//! - **Portal ↔ backend:** bearer tokens and JSON bodies only. `Set-Cookie`
//!   headers emitted by the backend are consumed at the boundary and never
//!   relayed to the browser.
//!
//! ## Token refresh
//!
//! [`client::TokenRefreshCoordinator`] owns an in-memory token pair and
//! guarantees that concurrent refresh demand produces at most one backend
//! refresh call. Authenticated requests are retried exactly once after a
//! successful refresh. The portal builds one coordinator per request from that
//! request's cookies, so no token state is shared across users.

pub mod cli;
pub mod client;
pub mod portal;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
