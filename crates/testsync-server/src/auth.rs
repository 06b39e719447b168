//! HTTP basic authentication for the session API.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::error::ApiError;

/// The single username/password pair the sync clients authenticate with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Split an `Authorization: Basic ...` header value into user and password.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without valid basic auth credentials.
pub async fn require_basic_auth(
    State(credentials): State<Arc<Credentials>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        debug!("could not get basic auth");
        return Err(ApiError::unauthorized());
    };

    match parse_basic(header) {
        Some((user, pass)) if credentials.matches(&user, &pass) => Ok(next.run(request).await),
        Some(_) => {
            debug!("could not validate user, invalid credentials");
            Err(ApiError::unauthorized())
        }
        None => {
            debug!("malformed basic auth header");
            Err(ApiError::unauthorized())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn parses_valid_header() {
        assert_eq!(
            parse_basic(&header("worker", "s3cret")),
            Some(("worker".into(), "s3cret".into()))
        );
    }

    #[test]
    fn password_may_contain_colons() {
        assert_eq!(
            parse_basic(&header("worker", "a:b:c")),
            Some(("worker".into(), "a:b:c".into()))
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let value = header("u", "p").replacen("Basic", "basic", 1);
        assert!(parse_basic(&value).is_some());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!not-base64"), None);
        assert_eq!(parse_basic(&format!("Basic {}", STANDARD.encode("nocolon"))), None);
        assert_eq!(parse_basic(""), None);
    }

    #[test]
    fn credentials_match_exactly() {
        let creds = Credentials::new("u", "p");
        assert!(creds.matches("u", "p"));
        assert!(!creds.matches("u", "P"));
        assert!(!creds.matches("", ""));
        assert!(!format!("{creds:?}").contains("\"p\""));
    }
}
