//! Runtime configuration read from the process environment.
//! A `.env` file, when present, is loaded into the environment before this runs.

use crate::auth::{DEFAULT_API_URL, DEFAULT_AUTH_URL, LoginCredentials};
use crate::models::tado::HomeId;
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_REFRESH_SECS: u64 = 300;
pub const DEFAULT_REFETCH_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Full URL of the OAuth token endpoint.
    pub auth_url: String,
    /// Base of the v2 API, without trailing slash.
    pub api_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: LoginCredentials,
    /// Fixed per-request timeout for every HTTP exchange.
    pub http_timeout: Duration,
    /// Token renewal cadence. Must be shorter than the access-token lifetime.
    pub token_refresh_interval: Duration,
    /// Zone state polling cadence.
    pub refetch_interval: Duration,
    /// Home to poll; defaults to the first home of the account.
    pub home_id: Option<HomeId>,
    pub endpoints: Endpoints,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| format!("Missing required setting {}", key));

        let credentials = LoginCredentials {
            username: required("TADO_USERNAME")?,
            password: required("TADO_PASSWORD")?,
            client_secret: required("TADO_CLIENT_SECRET")?,
        };

        let duration = |key: &str, default_secs: u64| -> Result<Duration, String> {
            match get(key) {
                Some(raw) => parse_duration(&raw).map_err(|e| format!("{} is invalid: {}", key, e)),
                None => Ok(Duration::from_secs(default_secs)),
            }
        };

        let home_id = match get("TADO_HOME_ID") {
            Some(raw) => Some(HomeId(
                raw.parse::<i64>()
                    .map_err(|_| "TADO_HOME_ID must be an integer".to_string())?,
            )),
            None => None,
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            auth_url: get("TADO_AUTH_URL").unwrap_or(defaults.auth_url),
            api_url: get("TADO_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
        };

        Ok(Config {
            credentials,
            http_timeout: duration("HTTP_CLIENT_TIMEOUT", DEFAULT_HTTP_TIMEOUT_SECS)?,
            token_refresh_interval: duration("TOKEN_REFRESH_PERIOD", DEFAULT_TOKEN_REFRESH_SECS)?,
            refetch_interval: duration("REFETCH_PERIOD", DEFAULT_REFETCH_SECS)?,
            home_id,
            endpoints,
        })
    }
}

/// Parse `500ms`, `30s`, `5m`, `1h30m`, `1.5h` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let total = if let Ok(secs) = s.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        let mut total = Duration::ZERO;
        let mut rest = s;
        while !rest.is_empty() {
            let num_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| format!("missing unit in {:?}", raw))?;
            if num_len == 0 {
                return Err(format!("expected a number in {:?}", raw));
            }
            let value: f64 = rest[..num_len]
                .parse()
                .map_err(|_| format!("invalid number in {:?}", raw))?;
            rest = &rest[num_len..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let scale = match &rest[..unit_len] {
                "ms" => 0.001,
                "s" => 1.0,
                "m" => 60.0,
                "h" => 3600.0,
                other => return Err(format!("unknown unit {:?} in {:?}", other, raw)),
            };
            rest = &rest[unit_len..];
            let secs = value * scale;
            if !secs.is_finite() {
                return Err(format!("duration out of range: {:?}", raw));
            }
            let part = Duration::try_from_secs_f64(secs)
                .map_err(|e| format!("duration out of range: {:?} ({})", raw, e))?;
            total = total
                .checked_add(part)
                .ok_or_else(|| format!("duration out of range: {:?}", raw))?;
        }
        total
    };

    if total.is_zero() {
        return Err(format!("duration must be positive: {:?}", raw));
    }
    Ok(total)
}
