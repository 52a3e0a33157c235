use crate::{
    client::BackendClient,
    portal::{self, PortalConfig},
};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
    pub cookie_secure: bool,
    pub access_token_max_age: u64,
    pub refresh_token_max_age: u64,
    pub protected_paths: Vec<String>,
}

impl Args {
    /// Build the portal configuration these arguments describe.
    ///
    /// # Errors
    /// Returns an error if the backend client cannot be built.
    pub fn portal_config(self) -> Result<PortalConfig> {
        let backend = BackendClient::new(&self.backend_url, self.request_timeout)
            .with_context(|| format!("Failed to build backend client for {}", self.backend_url))?;

        Ok(PortalConfig::new(backend)
            .with_refresh_timeout(self.refresh_timeout)
            .with_cookie_secure(self.cookie_secure)
            .with_access_token_max_age(self.access_token_max_age)
            .with_refresh_token_max_age(self.refresh_token_max_age)
            .with_protected_paths(self.protected_paths))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let port = args.port;
    let config = args.portal_config()?;

    portal::new(port, config).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            backend_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(5),
            refresh_timeout: Duration::from_secs(2),
            cookie_secure: true,
            access_token_max_age: 60,
            refresh_token_max_age: 3600,
            protected_paths: vec!["/dashboard".to_string(), "/account".to_string()],
        }
    }

    #[test]
    fn portal_config_from_args() {
        let config = args().portal_config().unwrap();
        assert!(config.cookie_secure());
        assert_eq!(config.refresh_timeout(), Duration::from_secs(2));
        assert_eq!(config.access_token_max_age(), 60);
        assert_eq!(config.refresh_token_max_age(), 3600);
        assert_eq!(config.protected_paths().len(), 2);
        assert_eq!(config.backend().base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn invalid_backend_url_fails() {
        let mut args = args();
        args.backend_url = "::not a url".to_string();
        assert!(args.portal_config().is_err());
    }
}
