use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the Backend Auth Service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
    #[error("Unable to reach the backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend request timed out")]
    Timeout,
    #[error("Backend rejected the request ({status})")]
    Upstream {
        status: StatusCode,
        content_type: Option<String>,
        body: String,
    },
    #[error("Unexpected backend response: {0}")]
    Malformed(String),
    #[error("Session is missing or expired")]
    Unauthorized,
}

impl ClientError {
    /// Upstream HTTP status, when the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_reported_for_upstream_and_unauthorized() {
        let upstream = ClientError::Upstream {
            status: StatusCode::CONFLICT,
            content_type: None,
            body: String::new(),
        };
        assert_eq!(upstream.status(), Some(StatusCode::CONFLICT));
        assert_eq!(
            ClientError::Unauthorized.status(),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(ClientError::Timeout.status(), None);
    }
}
