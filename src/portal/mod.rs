//! Browser-facing portal: page shells behind the route guard, same-origin proxy
//! routes to the Backend Auth Service, health and `OpenAPI`.

pub mod config;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod handlers;
mod openapi;

pub use config::PortalConfig;
pub use openapi::openapi;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Json, Router,
};
use handlers::pages;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

/// Build the full portal application.
///
/// Aliases like `/login` are rewritten before routing, so the guard and the
/// router only ever see canonical `/auth/...` paths.
#[must_use]
pub fn router(config: Arc<PortalConfig>) -> Router {
    let (api, document) = openapi::api_router().split_for_parts();
    let document = Arc::new(document);

    let app = api
        .route(
            "/openapi.json",
            get(move || {
                let document = Arc::clone(&document);
                async move { Json(document.as_ref().clone()) }
            }),
        )
        .route("/", get(pages::home))
        .route("/auth/login", get(pages::login))
        .route("/auth/register", get(pages::register))
        .route("/auth/verify-email", get(pages::verify_email))
        .route("/auth/forgot-password", get(pages::forgot_password))
        .route("/auth/reset-password", get(pages::reset_password))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/{*rest}", get(pages::dashboard))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(config))
                .layer(middleware::from_fn(guard::route_guard)),
        );

    Router::new()
        .fallback_service(app)
        .layer(middleware::from_fn(guard::rewrite_aliases))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: PortalConfig) -> Result<()> {
    info!(backend = %config.backend().base_url(), "Using backend auth service");

    let app = router(Arc::new(config));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
