use super::handlers::{auth, health, me};
use utoipa::openapi::{InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Documented routes. Page shells and `/openapi.json` itself are added in
/// `portal::router` and stay out of the document.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::login))
        .routes(routes!(auth::register))
        .routes(routes!(auth::verify_email))
        .routes(routes!(auth::resend_code))
        .routes(routes!(auth::forgot_password))
        .routes(routes!(auth::reset_password))
        .routes(routes!(auth::refresh))
        .routes(routes!(auth::logout))
        .routes(routes!(me::me))
        .routes(routes!(me::sessions));

    router.get_openapi_mut().tags = Some(vec![
        tag("auth", "Sign-in, registration and password reset proxied to the backend"),
        tag("session", "Authenticated calls with transparent token refresh"),
        tag("health", "Portal and backend reachability"),
    ]);

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    let license = env!("CARGO_PKG_LICENSE");
    if !license.is_empty() {
        let mut spdx = License::new(license);
        spdx.identifier = Some(license.to_string());
        info.license = Some(spdx);
    }
    OpenApiBuilder::new().info(info).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_from_cargo() {
        let document = openapi();
        assert_eq!(document.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(document.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            document.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
    }

    #[test]
    fn proxy_routes_are_documented() {
        let document = openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/auth/register",
            "/api/auth/verify-email",
            "/api/auth/resend-code",
            "/api/auth/forgot-password",
            "/api/auth/reset-password",
            "/api/auth/refresh",
            "/api/auth/logout",
            "/api/auth/sessions",
            "/api/me",
        ] {
            assert!(document.paths.paths.contains_key(path), "missing {path}");
        }
        let tags = document.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "session"));
    }
}
