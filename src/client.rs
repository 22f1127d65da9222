//! Read-only client for the Tado v2 API endpoints this service polls.
//!
//! - Blocking, one attempt per call; errors go straight back to the caller.
//! - Every call reads the live access token from the shared `CredentialStore`.
//! - No call has side effects on the remote side (GET only).

use crate::credentials::{Credential, CredentialStore};
use crate::error::ApiError;
use crate::models::tado::*;
use crate::transport::{Transport, send_json};
use http::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub struct TadoClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl TadoClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>, credentials: Arc<CredentialStore>) -> Self {
        TadoClient {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn bearer(&self) -> Result<Arc<Credential>, ApiError> {
        if self.credentials.is_discarded() {
            return Err(ApiError::SessionDiscarded);
        }
        Ok(self.credentials.current())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let credential = self.bearer()?;
        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(self.url(path))
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", credential.access_token()))
            .body(Vec::new())?;
        send_json(self.transport.as_ref(), request)
    }

    pub fn get_owner(&self) -> Result<Owner, ApiError> {
        self.get_json("/me")
    }

    pub fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, ApiError> {
        self.get_json(&format!("/homes/{}/zones", home_id.0))
    }

    pub fn get_zone_state(&self, home_id: HomeId, zone_id: ZoneId) -> Result<ZoneState, ApiError> {
        self.get_json(&format!("/homes/{}/zones/{}/state", home_id.0, zone_id.0))
    }

    pub fn get_zone_states(&self, home_id: HomeId) -> Result<ZoneStates, ApiError> {
        self.get_json(&format!("/homes/{}/zoneStates", home_id.0))
    }
}
