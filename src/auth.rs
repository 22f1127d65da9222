//! OAuth2 grants against the Tado auth server.
//!
//! Authentication
//! - `login` performs the password grant (fixed client id and `home.user` scope).
//! - `renew` performs the refresh grant with only the refresh token and client secret.
//! - Neither call retries nor keeps state between calls.

use crate::error::{ApiError, AuthError, AuthErrorKind};
use crate::models::tado::TokenPair;
use crate::transport::{HttpRequest, Transport, send_json};
use http::header::{ACCEPT, CONTENT_TYPE};
use log::debug;
use std::sync::Arc;

pub const DEFAULT_AUTH_URL: &str = "https://auth.tado.com/oauth/token";
pub const DEFAULT_API_URL: &str = "https://my.tado.com/api/v2";
const OAUTH_CLIENT_ID: &str = "tado-web-app";
const OAUTH_SCOPE: &str = "home.user";

/// Secrets for the password grant. `Debug` never prints the password or client secret.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    pub client_secret: String,
}

impl core::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Authenticator {
    transport: Arc<dyn Transport>,
    token_url: String,
}

impl Authenticator {
    pub fn new(transport: Arc<dyn Transport>, token_url: impl Into<String>) -> Self {
        Authenticator {
            transport,
            token_url: token_url.into(),
        }
    }

    pub fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        debug!("Requesting password grant for {}", credentials.username);
        let form = [
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "password"),
            ("scope", OAUTH_SCOPE),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        self.exchange(&form).map_err(|e| {
            let kind = match e.status() {
                Some(status) if (400..500).contains(&status) => AuthErrorKind::BadCredentials,
                _ => AuthErrorKind::ServiceError,
            };
            AuthError::new(kind, e)
        })
    }

    pub fn renew(&self, refresh_token: &str, client_secret: &str) -> Result<TokenPair, AuthError> {
        debug!("Requesting refresh grant");
        let form = [
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];
        self.exchange(&form).map_err(|e| {
            let kind = match e {
                ApiError::BadStatus { .. } => AuthErrorKind::RefreshRejected,
                _ => AuthErrorKind::ServiceError,
            };
            AuthError::new(kind, e)
        })
    }

    fn token_request(&self, form: &[(&str, &str)]) -> Result<HttpRequest, ApiError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter())
            .finish();
        Ok(http::Request::builder()
            .method(http::Method::POST)
            .uri(self.token_url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body.into_bytes())?)
    }

    fn exchange(&self, form: &[(&str, &str)]) -> Result<TokenPair, ApiError> {
        let request = self.token_request(form)?;
        let tokens: TokenPair = send_json(self.transport.as_ref(), request)?;
        if !tokens.is_complete() {
            return Err(ApiError::Decode {
                path: if tokens.access_token.is_empty() {
                    "access_token".to_string()
                } else {
                    "refresh_token".to_string()
                },
                message: "token must not be empty".to_string(),
            });
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn token_body(n: u32) -> String {
        format!(
            r#"{{"access_token":"access-{n}","token_type":"bearer","refresh_token":"refresh-{n}","expires_in":599,"scope":"home.user","jti":"jti-{n}"}}"#
        )
    }

    fn credentials() -> LoginCredentials {
        LoginCredentials {
            username: "ann@example.com".to_string(),
            password: "p&ss word".to_string(),
            client_secret: "s3cret".to_string(),
        }
    }

    fn authenticator(mock: &Arc<MockTransport>) -> Authenticator {
        Authenticator::new(mock.clone(), "https://auth.example.test/oauth/token")
    }

    #[test]
    fn login_posts_password_grant_form() {
        let mock = Arc::new(MockTransport::scripted(vec![Ok((200, token_body(1)))]));
        let tokens = authenticator(&mock).login(&credentials()).expect("login");
        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token, "refresh-1");

        let reqs = mock.requests();
        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.uri, "https://auth.example.test/oauth/token");
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.form_value("client_id").as_deref(), Some("tado-web-app"));
        assert_eq!(req.form_value("grant_type").as_deref(), Some("password"));
        assert_eq!(req.form_value("scope").as_deref(), Some("home.user"));
        assert_eq!(req.form_value("username").as_deref(), Some("ann@example.com"));
        assert_eq!(req.form_value("password").as_deref(), Some("p&ss word"));
        assert_eq!(req.form_value("client_secret").as_deref(), Some("s3cret"));
    }

    #[test]
    fn login_rejection_is_bad_credentials() {
        let mock = Arc::new(MockTransport::scripted(vec![Ok((
            401,
            r#"{"error":"invalid_grant"}"#.to_string(),
        ))]));
        let err = authenticator(&mock).login(&credentials()).unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::BadCredentials);
        assert_eq!(err.source.status(), Some(401));
    }

    #[test]
    fn login_server_failure_is_service_error() {
        let mock = Arc::new(MockTransport::scripted(vec![Ok((502, String::new()))]));
        let err = authenticator(&mock).login(&credentials()).unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::ServiceError);
    }

    #[test]
    fn login_malformed_body_is_service_error() {
        let mock = Arc::new(MockTransport::scripted(vec![Ok((200, "<html>".to_string()))]));
        let err = authenticator(&mock).login(&credentials()).unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::ServiceError);
        assert!(matches!(err.source, ApiError::Decode { .. }));
    }

    #[test]
    fn login_with_empty_refresh_token_is_rejected() {
        let body = r#"{"access_token":"a","refresh_token":"","expires_in":599}"#.to_string();
        let mock = Arc::new(MockTransport::scripted(vec![Ok((200, body))]));
        let err = authenticator(&mock).login(&credentials()).unwrap_err();
        match err.source {
            ApiError::Decode { path, .. } => assert_eq!(path, "refresh_token"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn renew_sends_only_refresh_token_and_secret() {
        let mock = Arc::new(MockTransport::scripted(vec![Ok((200, token_body(2)))]));
        let tokens = authenticator(&mock).renew("refresh-1", "s3cret").expect("renew");
        assert_eq!(tokens.access_token, "access-2");

        let req = &mock.requests()[0];
        let mut keys = req.form().into_iter().map(|(k, _)| k).collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["client_id", "client_secret", "grant_type", "refresh_token"]);
        assert_eq!(req.form_value("grant_type").as_deref(), Some("refresh_token"));
        assert_eq!(req.form_value("refresh_token").as_deref(), Some("refresh-1"));
        assert!(req.form_value("password").is_none());
    }

    #[test]
    fn renew_rejection_is_not_retried() {
        let mock = Arc::new(MockTransport::scripted(vec![
            Ok((400, r#"{"error":"invalid_grant"}"#.to_string())),
            Ok((200, token_body(3))),
        ]));
        let err = authenticator(&mock).renew("stale", "s3cret").unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::RefreshRejected);
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn renew_transport_failure_is_service_error() {
        let mock = Arc::new(MockTransport::scripted(vec![Err(ApiError::Transport("timed out".to_string()))]));
        let err = authenticator(&mock).renew("refresh-1", "s3cret").unwrap_err();
        assert_eq!(err.kind, AuthErrorKind::ServiceError);
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let dbg = format!("{:?}", credentials());
        assert!(dbg.contains("ann@example.com"));
        assert!(!dbg.contains("p&ss word"));
        assert!(!dbg.contains("s3cret"));
    }
}
