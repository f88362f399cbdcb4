//! Basic-auth middleware for the admin routes.
//!
//! Auth is enforced only when both credentials are configured; otherwise
//! every request passes through.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::AppState;

/// Optional basic-auth credentials.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    username: Option<String>,
    password: Option<String>,
}

impl AuthConfig {
    pub fn from_settings(settings: &magpie::config::Settings) -> Self {
        Self {
            username: settings.http_auth_username.clone(),
            password: settings.http_auth_password.clone(),
        }
    }

    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Gate a request on the configured credentials.
pub async fn basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some((user, pass)) = state.auth.credentials() else {
        return next.run(request).await;
    };

    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Basic "))
        .and_then(|v| BASE64.decode(v.trim()).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok());

    if let Some(decoded) = supplied {
        if let Some((u, p)) = decoded.split_once(':') {
            if u == user && p == pass {
                return next.run(request).await;
            }
        }
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"magpie\"")],
        "unauthorized\n",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_both_halves() {
        assert!(AuthConfig::new(None, None).credentials().is_none());
        assert!(AuthConfig::new(Some("u".into()), None).credentials().is_none());
        assert_eq!(
            AuthConfig::new(Some("u".into()), Some("p".into())).credentials(),
            Some(("u", "p"))
        );
    }
}
