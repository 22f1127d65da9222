use crate::models::tado::HomeId;
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of a single HTTP exchange against the Tado API.
#[derive(Debug)]
pub enum ApiError {
    /// Connection, TLS or timeout failure before a response was read.
    Transport(String),
    /// Any non-2xx response; 401/403/429 are not special-cased.
    BadStatus { status: u16, message: String },
    /// Body was not the expected JSON; `path` points at the offending field.
    Decode { path: String, message: String },
    /// The request could not be assembled (bad URL or header value).
    InvalidRequest(String),
    /// The credential was discarded after a failed renewal; nothing was sent.
    SessionDiscarded,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(s) => write!(f, "transport error: {}", s),
            ApiError::BadStatus { status, message } => write!(f, "bad http status {}: {}", status, message),
            ApiError::Decode { path, message } => write!(f, "json decode error at {}: {}", path, message),
            ApiError::InvalidRequest(s) => write!(f, "invalid request: {}", s),
            ApiError::SessionDiscarded => write!(f, "session credential was discarded after a failed renewal"),
        }
    }
}

impl Error for ApiError {}

impl From<http::Error> for ApiError {
    fn from(value: http::Error) -> Self {
        ApiError::InvalidRequest(value.to_string())
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ApiError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ApiError::Decode {
            path: value.path().to_string(),
            message: value.into_inner().to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Password grant rejected by the auth server (4xx).
    BadCredentials,
    /// Refresh grant rejected; the refresh token is no longer usable.
    RefreshRejected,
    /// Auth server unreachable, failing (5xx) or answering with an unusable body.
    ServiceError,
}

#[derive(Debug)]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub source: ApiError,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, source: ApiError) -> Self {
        AuthError { kind, source }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            AuthErrorKind::BadCredentials => "login rejected",
            AuthErrorKind::RefreshRejected => "token refresh rejected",
            AuthErrorKind::ServiceError => "auth service error",
        };
        write!(f, "{}: {}", what, self.source)
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Errors while establishing a session and choosing the home to poll.
#[derive(Debug)]
pub enum SessionError {
    Auth(AuthError),
    Api(ApiError),
    /// The owner profile lists no homes.
    NoHomesFound,
    /// A home id was configured but the owner has no such home.
    HomeNotFound(HomeId),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Auth(e) => write!(f, "authentication failed: {}", e),
            SessionError::Api(e) => write!(f, "api error: {}", e),
            SessionError::NoHomesFound => write!(f, "no homes found; ensure the account has homes"),
            SessionError::HomeNotFound(id) => write!(f, "home {} not found for this account", id),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Auth(e) => Some(e),
            SessionError::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AuthError> for SessionError {
    fn from(value: AuthError) -> Self {
        SessionError::Auth(value)
    }
}

impl From<ApiError> for SessionError {
    fn from(value: ApiError) -> Self {
        SessionError::Api(value)
    }
}
