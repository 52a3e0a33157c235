//! Request and response bodies of the portal routes. Request fields are
//! optional so a missing field becomes a 400 with its name, not a decode error.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct CredentialsBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct VerifyEmailBody {
    pub email: Option<String>,
    pub code: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct EmailBody {
    pub email: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ResetPasswordBody {
    pub email: Option<String>,
    pub code: Option<String>,
    pub new_password: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct LogoutBody {
    /// Revoke every session of the user, not only this one.
    #[serde(default)]
    pub logout_all: bool,
}

/// Answer of routes that store a session. Tokens stay in `HttpOnly` cookies.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionGranted {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_revoked: Option<u64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}
