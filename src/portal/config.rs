//! Portal configuration: backend client, cookie policy and route guard paths.

use crate::client::{coordinator::DEFAULT_REFRESH_TIMEOUT, BackendClient};
use std::time::Duration;

pub const DEFAULT_ACCESS_TOKEN_MAX_AGE: u64 = 900;
pub const DEFAULT_REFRESH_TOKEN_MAX_AGE: u64 = 604_800;
pub const DEFAULT_PROTECTED_PATH: &str = "/dashboard";
pub const LOGIN_PAGE: &str = "/auth/login";
pub const HOME_PAGE: &str = "/dashboard";

/// Runtime configuration shared by every portal handler.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    backend: BackendClient,
    refresh_timeout: Duration,
    cookie_secure: bool,
    access_token_max_age: u64,
    refresh_token_max_age: u64,
    protected_paths: Vec<String>,
    auth_pages: Vec<String>,
}

/// Outcome of the route guard for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

impl PortalConfig {
    #[must_use]
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            cookie_secure: false,
            access_token_max_age: DEFAULT_ACCESS_TOKEN_MAX_AGE,
            refresh_token_max_age: DEFAULT_REFRESH_TOKEN_MAX_AGE,
            protected_paths: vec![DEFAULT_PROTECTED_PATH.to_string()],
            auth_pages: vec![LOGIN_PAGE.to_string(), "/auth/register".to_string()],
        }
    }

    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Mark cookies `Secure`; only enable when the portal is served over HTTPS.
    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_access_token_max_age(mut self, seconds: u64) -> Self {
        self.access_token_max_age = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_max_age(mut self, seconds: u64) -> Self {
        self.refresh_token_max_age = seconds;
        self
    }

    /// Replace the protected prefixes. Blank entries are ignored and an empty
    /// list falls back to the default prefix.
    #[must_use]
    pub fn with_protected_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths
            .into_iter()
            .filter_map(|path| normalize_path(path.as_ref()))
            .collect();
        self.protected_paths = if paths.is_empty() {
            vec![DEFAULT_PROTECTED_PATH.to_string()]
        } else {
            paths
        };
        self
    }

    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    #[must_use]
    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn access_token_max_age(&self) -> u64 {
        self.access_token_max_age
    }

    #[must_use]
    pub fn refresh_token_max_age(&self) -> u64 {
        self.refresh_token_max_age
    }

    #[must_use]
    pub fn protected_paths(&self) -> &[String] {
        &self.protected_paths
    }

    /// Decide whether a request for `path` may proceed.
    #[must_use]
    pub fn guard(&self, path: &str, has_access_cookie: bool) -> GuardDecision {
        let path = normalize_path(path).unwrap_or_else(|| "/".to_string());
        if !has_access_cookie
            && self
                .protected_paths
                .iter()
                .any(|prefix| matches_prefix(&path, prefix))
        {
            return GuardDecision::Redirect(LOGIN_PAGE);
        }
        if has_access_cookie && self.auth_pages.iter().any(|page| *page == path) {
            return GuardDecision::Redirect(HOME_PAGE);
        }
        GuardDecision::Allow
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Trim, ensure a leading slash and drop trailing slashes.
fn normalize_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::backend::DEFAULT_REQUEST_TIMEOUT;

    fn config() -> PortalConfig {
        let backend = BackendClient::new("http://127.0.0.1:9", DEFAULT_REQUEST_TIMEOUT).unwrap();
        PortalConfig::new(backend)
    }

    #[test]
    fn defaults() {
        let config = config();
        assert!(!config.cookie_secure());
        assert_eq!(config.access_token_max_age(), 900);
        assert_eq!(config.refresh_token_max_age(), 604_800);
        assert_eq!(config.protected_paths(), ["/dashboard".to_string()]);
        assert_eq!(config.refresh_timeout(), DEFAULT_REFRESH_TIMEOUT);
    }

    #[test]
    fn protected_path_without_cookie_redirects_to_login() {
        let config = config();
        assert_eq!(
            config.guard("/dashboard", false),
            GuardDecision::Redirect(LOGIN_PAGE)
        );
        assert_eq!(
            config.guard("/dashboard/settings", false),
            GuardDecision::Redirect(LOGIN_PAGE)
        );
        assert_eq!(config.guard("/dashboard", true), GuardDecision::Allow);
    }

    #[test]
    fn prefix_match_respects_segments() {
        let config = config();
        assert_eq!(config.guard("/dashboards", false), GuardDecision::Allow);
    }

    #[test]
    fn auth_pages_with_cookie_redirect_home() {
        let config = config();
        assert_eq!(
            config.guard("/auth/login", true),
            GuardDecision::Redirect(HOME_PAGE)
        );
        assert_eq!(
            config.guard("/auth/register/", true),
            GuardDecision::Redirect(HOME_PAGE)
        );
        assert_eq!(config.guard("/auth/login", false), GuardDecision::Allow);
        assert_eq!(config.guard("/auth/verify-email", true), GuardDecision::Allow);
    }

    #[test]
    fn custom_protected_paths() {
        let config = config().with_protected_paths(["settings/", " ", "/billing"]);
        assert_eq!(
            config.protected_paths(),
            ["/settings".to_string(), "/billing".to_string()]
        );
        assert_eq!(config.guard("/dashboard", false), GuardDecision::Allow);
        assert_eq!(
            config.guard("/billing/invoices", false),
            GuardDecision::Redirect(LOGIN_PAGE)
        );

        let config = config.with_protected_paths(Vec::<String>::new());
        assert_eq!(config.protected_paths(), ["/dashboard".to_string()]);
    }
}
