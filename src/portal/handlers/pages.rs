//! HTML shells for the portal pages. Each names its page in `data-page` and
//! leaves rendering to the static bundle.

use axum::response::Html;

const BUNDLE: &str = "/static/app.js";

fn shell(page: &str, title: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<main id="app" data-page="{page}"></main>
<script type="module" src="{BUNDLE}"></script>
</body>
</html>
"#
    ))
}

pub async fn home() -> Html<String> {
    shell("home", "Welcome")
}

pub async fn login() -> Html<String> {
    shell("login", "Sign in")
}

pub async fn register() -> Html<String> {
    shell("register", "Create account")
}

pub async fn verify_email() -> Html<String> {
    shell("verify-email", "Verify email")
}

pub async fn forgot_password() -> Html<String> {
    shell("forgot-password", "Forgot password")
}

pub async fn reset_password() -> Html<String> {
    shell("reset-password", "Reset password")
}

pub async fn dashboard() -> Html<String> {
    shell("dashboard", "Dashboard")
}
