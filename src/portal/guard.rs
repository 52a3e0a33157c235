//! Route guard and path aliases.
//!
//! The guard only looks at whether an `accessToken` cookie is present; it does
//! not validate it. A stale cookie reaches the page, and the page's `/api/me`
//! call takes care of refresh or sign-in.

use super::{
    config::{GuardDecision, PortalConfig},
    cookies,
};
use axum::{
    extract::{Extension, Request},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Short paths served as their `/auth/...` page.
const ALIASES: [(&str, &str); 5] = [
    ("/login", "/auth/login"),
    ("/register", "/auth/register"),
    ("/verify-email", "/auth/verify-email"),
    ("/forgot-password", "/auth/forgot-password"),
    ("/reset-password", "/auth/reset-password"),
];

/// Target of an alias, if `path` is one.
#[must_use]
pub fn alias_target(path: &str) -> Option<&'static str> {
    let path = path.trim_end_matches('/');
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == path)
        .map(|(_, target)| *target)
}

/// Rewrite alias paths in place, keeping the query string.
pub async fn rewrite_aliases(mut request: Request, next: Next) -> Response {
    if let Some(target) = alias_target(request.uri().path()) {
        let rewritten = match request.uri().query() {
            Some(query) => format!("{target}?{query}"),
            None => target.to_string(),
        };
        if let Ok(uri) = rewritten.parse::<Uri>() {
            debug!(from = %request.uri().path(), to = target, "rewriting alias");
            *request.uri_mut() = uri;
        }
    }
    next.run(request).await
}

/// Redirect anonymous users away from protected pages and signed-in users away
/// from the login and register pages.
pub async fn route_guard(
    config: Extension<Arc<PortalConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let has_cookie = cookies::has_access_token(request.headers());
    match config.guard(request.uri().path(), has_cookie) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(location) => {
            debug!(path = %request.uri().path(), location, "route guard redirect");
            Redirect::temporary(location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve() {
        assert_eq!(alias_target("/login"), Some("/auth/login"));
        assert_eq!(alias_target("/register/"), Some("/auth/register"));
        assert_eq!(alias_target("/reset-password"), Some("/auth/reset-password"));
        assert_eq!(alias_target("/auth/login"), None);
        assert_eq!(alias_target("/dashboard"), None);
    }
}
