//! Request and response types for the Backend Auth Service. Token-bearing
//! types keep their values in `SecretString` so they never reach logs.

use super::errors::ClientError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cookie names shared by the backend and the portal.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Value some backends put in the JSON body when the real tokens travel in cookies.
const COOKIE_PLACEHOLDER: &str = "set_in_cookie";

/// Access and refresh token held by a session.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

/// Validated token response from login, verify-email or refresh.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenGrant {
    /// Build a grant from a backend response body and its `Set-Cookie` values.
    ///
    /// Tokens in the body win. A body carrying only the cookie placeholder falls
    /// back to the `accessToken`/`refreshToken` cookies.
    ///
    /// # Errors
    /// Returns `ClientError::Malformed` when no usable access token is present.
    pub fn from_response<'a>(
        body: &[u8],
        set_cookies: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ClientError> {
        let parsed: TokenBody = serde_json::from_slice(body)
            .map_err(|err| ClientError::Malformed(format!("token body: {err}")))?;

        let cookies: Vec<(String, String)> = set_cookies
            .into_iter()
            .filter_map(parse_set_cookie)
            .collect();
        let from_cookie = |name: &str| {
            cookies
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .and_then(usable_token)
        };

        let access_token = parsed
            .access_token
            .and_then(usable_token)
            .or_else(|| from_cookie(ACCESS_TOKEN_COOKIE))
            .ok_or_else(|| ClientError::Malformed("missing access_token".to_string()))?;
        let refresh_token = parsed
            .refresh_token
            .and_then(usable_token)
            .or_else(|| from_cookie(REFRESH_TOKEN_COOKIE));

        Ok(Self {
            access_token: SecretString::from(access_token),
            refresh_token: refresh_token.map(SecretString::from),
            expires_in: parsed.expires_in.filter(|seconds| *seconds > 0),
        })
    }

    /// Merge into a pair, keeping `previous_refresh` when the grant carries none.
    #[must_use]
    pub fn into_pair(self, previous_refresh: Option<SecretString>) -> Option<TokenPair> {
        let refresh_token = self.refresh_token.or(previous_refresh)?;
        Some(TokenPair {
            access_token: self.access_token,
            refresh_token,
        })
    }
}

fn usable_token(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == COOKIE_PLACEHOLDER {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract `name=value` from a `Set-Cookie` header value.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub logout_all: bool,
}

/// Plain acknowledgement returned by most backend endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sessions_revoked: Option<u64>,
}

/// Profile returned by `/api/me`. Unknown fields are preserved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Active sessions of the current user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveSessions {
    pub current_session_id: String,
    pub total_sessions: usize,
    #[serde(default)]
    pub sessions: Vec<Value>,
}

impl std::fmt::Display for TokenPair {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only lengths, never the material itself.
        write!(
            formatter,
            "TokenPair(access: {} chars, refresh: {} chars)",
            self.access_token.expose_secret().len(),
            self.refresh_token.expose_secret().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_reads_tokens_from_body() {
        let body = br#"{"access_token":"a1","refresh_token":"r1","token_type":"Bearer","expires_in":900}"#;
        let grant = TokenGrant::from_response(body, []).expect("grant");
        assert_eq!(grant.access_token.expose_secret(), "a1");
        assert_eq!(
            grant.refresh_token.as_ref().map(ExposeSecret::expose_secret),
            Some("r1")
        );
        assert_eq!(grant.expires_in, Some(900));
    }

    #[test]
    fn grant_falls_back_to_set_cookie_on_placeholder() {
        let body = br#"{"access_token":"set_in_cookie","refresh_token":"set_in_cookie","expires_in":900}"#;
        let cookies = [
            "accessToken=from-cookie; Path=/; HttpOnly; SameSite=Strict",
            "refreshToken=refresh-cookie; Path=/; HttpOnly",
        ];
        let grant = TokenGrant::from_response(body, cookies).expect("grant");
        assert_eq!(grant.access_token.expose_secret(), "from-cookie");
        assert_eq!(
            grant.refresh_token.as_ref().map(ExposeSecret::expose_secret),
            Some("refresh-cookie")
        );
    }

    #[test]
    fn grant_rejects_missing_access_token() {
        let result = TokenGrant::from_response(br#"{"error":"invalid"}"#, []);
        assert!(matches!(result, Err(ClientError::Malformed(_))));

        let result = TokenGrant::from_response(br#"{"access_token":""}"#, []);
        assert!(matches!(result, Err(ClientError::Malformed(_))));
    }

    #[test]
    fn grant_rejects_non_json() {
        let result = TokenGrant::from_response(b"<html>", []);
        assert!(matches!(result, Err(ClientError::Malformed(_))));
    }

    #[test]
    fn into_pair_keeps_previous_refresh_token() {
        let grant = TokenGrant::from_response(br#"{"access_token":"a2"}"#, []).expect("grant");
        let pair = grant
            .into_pair(Some(SecretString::from("r-old".to_string())))
            .expect("pair");
        assert_eq!(pair.access_token.expose_secret(), "a2");
        assert_eq!(pair.refresh_token.expose_secret(), "r-old");
    }

    #[test]
    fn into_pair_without_any_refresh_token_is_none() {
        let grant = TokenGrant::from_response(br#"{"access_token":"a2"}"#, []).expect("grant");
        assert!(grant.into_pair(None).is_none());
    }

    #[test]
    fn token_pair_display_hides_material() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let shown = pair.to_string();
        assert!(!shown.contains("secret-access"));
        assert!(!format!("{pair:?}").contains("secret-refresh"));
    }

    #[test]
    fn user_profile_keeps_extra_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.com","email_verified":true}"#)
                .expect("profile");
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.extra.get("email_verified"), Some(&Value::Bool(true)));
    }
}
