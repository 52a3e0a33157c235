use crate::client::ClientError;
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Every way a proxy route can fail. Each variant maps to one status code and a
/// JSON body, so handlers never fail past their boundary.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(String),
    #[error("Backend answered {status}")]
    Upstream {
        status: StatusCode,
        content_type: Option<String>,
        body: String,
    },
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Invalid response from authentication service: {0}")]
    BadGateway(String),
    #[error("Not authenticated")]
    AuthExpired,
}

impl ProxyError {
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("{field} is required"))
    }

    pub fn invalid(message: &str) -> Self {
        Self::Validation(message.to_string())
    }
}

impl From<ClientError> for ProxyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Upstream {
                status,
                content_type,
                body,
            } => Self::Upstream {
                status,
                content_type,
                body,
            },
            ClientError::Malformed(detail) => Self::BadGateway(detail),
            ClientError::Unauthorized => Self::AuthExpired,
            ClientError::InvalidUrl(_) | ClientError::Transport(_) | ClientError::Timeout => {
                Self::Transport(err.to_string())
            }
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(message) => error_body(StatusCode::BAD_REQUEST, &message),
            Self::Upstream {
                status,
                content_type,
                body,
            } => {
                let mut response = (status, body).into_response();
                // Relay the backend's own content type; the String body would claim text/plain.
                match content_type.and_then(|value| HeaderValue::from_str(&value).ok()) {
                    Some(value) => {
                        response.headers_mut().insert(CONTENT_TYPE, value);
                    }
                    None => {
                        response.headers_mut().remove(CONTENT_TYPE);
                    }
                }
                response
            }
            Self::Transport(detail) => {
                error!("Backend request failed: {detail}");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::BadGateway(detail) => {
                warn!("Malformed backend response: {detail}");
                error_body(
                    StatusCode::BAD_GATEWAY,
                    "Invalid response from authentication service",
                )
            }
            Self::AuthExpired => error_body(StatusCode::UNAUTHORIZED, "Not authenticated"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn parts(error: ProxyError) -> (StatusCode, Option<String>, String) {
        let response = error.into_response();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| value.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn validation_is_bad_request() {
        let (status, _, body) = parts(ProxyError::missing("email")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "email is required");
    }

    #[tokio::test]
    async fn upstream_is_relayed_verbatim() {
        let error = ProxyError::Upstream {
            status: StatusCode::CONFLICT,
            content_type: Some("application/json".to_string()),
            body: r#"{"error":"Email already registered"}"#.to_string(),
        };
        let (status, content_type, body) = parts(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, r#"{"error":"Email already registered"}"#);
    }

    #[tokio::test]
    async fn transport_and_timeout_are_internal_errors() {
        let (status, _, body) = parts(ClientError::Timeout.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn malformed_is_bad_gateway() {
        let error: ProxyError = ClientError::Malformed("missing access_token".to_string()).into();
        let (status, _, body) = parts(error).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Invalid response from authentication service");
    }

    #[tokio::test]
    async fn unauthorized_is_auth_expired() {
        let error: ProxyError = ClientError::Unauthorized.into();
        assert!(matches!(error, ProxyError::AuthExpired));
        let (status, _, _) = parts(error).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
