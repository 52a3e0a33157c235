use crate::{portal::config::PortalConfig, GIT_COMMIT_HASH};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    build: String,
    backend: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Portal and backend are reachable", body = Health),
        (status = 503, description = "Backend auth service is unreachable", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(config: Extension<Arc<PortalConfig>>) -> impl IntoResponse {
    let span = info_span!("backend.ping", backend = %config.backend().base_url());
    let backend_ok = config.backend().ping().instrument(span).await;

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: GIT_COMMIT_HASH.to_string(),
        backend: if backend_ok { "ok" } else { "error" }.to_string(),
    };

    let short_hash = health.build.get(0..7).unwrap_or_default();
    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    let status = if backend_ok {
        StatusCode::OK
    } else {
        debug!("Backend auth service is unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, Json(health))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::{backend::DEFAULT_REQUEST_TIMEOUT, BackendClient};
    use axum::body::to_bytes;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[tokio::test]
    async fn healthy_backend() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let backend = BackendClient::new(&server.uri(), DEFAULT_REQUEST_TIMEOUT).unwrap();
        let config = Arc::new(PortalConfig::new(backend));

        let response = health(Extension(config)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("X-App")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("authportal:"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Health = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.backend, "ok");
        assert_eq!(health.name, env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let backend = BackendClient::new("http://127.0.0.1:9", DEFAULT_REQUEST_TIMEOUT).unwrap();
        let config = Arc::new(PortalConfig::new(backend));

        let response = health(Extension(config)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
