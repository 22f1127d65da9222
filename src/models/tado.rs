//! Wire models for the Tado auth and v2 API endpoints used by this crate.
//!
//! Notes
//! - Remote entities are read-only snapshots; a new fetch yields a new value.
//! - Date/time fields use `chrono` (`DateTime<Utc>`).
//! - Open-ended string enums keep unknown values instead of failing to decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct HomeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub i64);

impl core::fmt::Display for HomeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =====================
// OAuth
// =====================

/// Token pair returned by the `oauth/token` endpoint for both grants.
///
/// A pair is never edited after it is decoded; renewal yields a new one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
    /// Token identifier issued by the auth server (`jti`).
    #[serde(rename = "jti", default)]
    pub issuer_id: String,
}

impl TokenPair {
    /// Both tokens must be present for the pair to be usable.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl core::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("issuer_id", &self.issuer_id)
            .finish()
    }
}

// =====================
// Owner / homes
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    pub id: HomeId,
    #[serde(default)]
    pub name: String,
}

/// Response of `GET /me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub homes: Vec<Home>,
}

impl Owner {
    pub fn home(&self, home_id: HomeId) -> Option<&Home> {
        self.homes.iter().find(|h| h.id == home_id)
    }
}

// =====================
// Zones and devices
// =====================

/// Zone type; values the API adds later pass through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ZoneType {
    Heating,
    HotWater,
    AirConditioning,
    Other(String),
}

impl From<String> for ZoneType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "HEATING" => ZoneType::Heating,
            "HOT_WATER" => ZoneType::HotWater,
            "AIR_CONDITIONING" => ZoneType::AirConditioning,
            _ => ZoneType::Other(value),
        }
    }
}

impl From<ZoneType> for String {
    fn from(value: ZoneType) -> Self {
        match value {
            ZoneType::Heating => "HEATING".to_string(),
            ZoneType::HotWater => "HOT_WATER".to_string(),
            ZoneType::AirConditioning => "AIR_CONDITIONING".to_string(),
            ZoneType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedValue {
    pub value: Option<Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OpenWindowDetection {
    pub supported: Option<bool>,
    pub enabled: Option<bool>,
    pub timeout_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_type: Option<String>,
    pub serial_no: Option<String>,
    pub short_serial_no: Option<String>,
    #[serde(rename = "currentFwVersion")]
    pub firmware_version: Option<String>,
    pub connection_state: Option<TimestampedValue>,
    pub mounting_state: Option<TimestampedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    #[serde(default)]
    pub name: String,
    pub r#type: ZoneType,
    #[serde(rename = "dateCreated")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_types: Vec<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
    pub open_window_detection: Option<OpenWindowDetection>,
}

// =====================
// Zone state(s)
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemperaturePrecision {
    pub celsius: Option<f64>,
    pub fahrenheit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureDataPoint {
    pub celsius: Option<f64>,
    pub fahrenheit: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub r#type: Option<String>,
    pub precision: Option<TemperaturePrecision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PercentageDataPoint {
    #[serde(rename = "type")]
    pub r#type: Option<String>,
    pub percentage: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataPoints {
    pub inside_temperature: Option<TemperatureDataPoint>,
    pub humidity: Option<PercentageDataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    pub sensor_data_points: Option<SensorDataPoints>,
}

impl ZoneState {
    pub fn inside_temperature_c(&self) -> Option<f64> {
        self.sensor_data_points
            .as_ref()
            .and_then(|s| s.inside_temperature.as_ref())
            .and_then(|t| t.celsius)
    }

    pub fn humidity_pct(&self) -> Option<f64> {
        self.sensor_data_points
            .as_ref()
            .and_then(|s| s.humidity.as_ref())
            .and_then(|h| h.percentage)
    }

    /// Most precise sensor timestamp available.
    pub fn measured_at(&self) -> Option<DateTime<Utc>> {
        let sensors = self.sensor_data_points.as_ref()?;
        sensors
            .inside_temperature
            .as_ref()
            .and_then(|t| t.timestamp)
            .or_else(|| sensors.humidity.as_ref().and_then(|h| h.timestamp))
    }
}

/// Response of `GET /homes/{homeId}/zoneStates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStates {
    pub zone_states: BTreeMap<String, ZoneState>, // keyed by zone id string
}

impl ZoneStates {
    pub fn get(&self, zone_id: ZoneId) -> Option<&ZoneState> {
        self.zone_states.get(&zone_id.0.to_string())
    }

    pub fn len(&self) -> usize {
        self.zone_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zone_states.is_empty()
    }
}
