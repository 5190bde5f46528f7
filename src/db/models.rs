//! Row structs for the irrigation tables.
//!
//! Read models (`Zone`, `IrrigationLog`, ...) decode rows returned by the
//! store; `New*` structs are the insert payloads. Columns the store fills in
//! itself (`id`, `created_at`) are absent from the insert payloads.

use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::utils::{de_f64, de_opt_f64, de_utc};

pub mod alert_types {
    pub const LOW_MOISTURE: &str = "low_moisture";
}

/// Primary/foreign key as delivered by the store: bigint or uuid/text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<&RecordId> for serde_json::Value {
    fn from(value: &RecordId) -> Self {
        match value {
            RecordId::Int(n) => serde_json::Value::from(*n),
            RecordId::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IrrigationMode {
    /// Threshold comparison with cooldown.
    #[default]
    Rule,
    /// Automatic evaluation disabled; irrigation only via requests.
    Manual,
    /// Reserved for a learned policy. Decides exactly like `Rule` for now.
    Smart,
}

impl IrrigationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IrrigationMode::Rule => "rule",
            IrrigationMode::Manual => "manual",
            IrrigationMode::Smart => "smart",
        }
    }
}

impl fmt::Display for IrrigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IrrigationMode {
    type Err = std::convert::Infallible;

    /// Case-insensitive. Anything unrecognised falls back to `Rule`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "manual" => IrrigationMode::Manual,
            "smart" => IrrigationMode::Smart,
            _ => IrrigationMode::Rule,
        })
    }
}

impl<'de> Deserialize<'de> for IrrigationMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(|s| s.parse::<IrrigationMode>().unwrap_or_default())
            .unwrap_or_default())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Resolved,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Zone {
    pub id: RecordId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_f64")]
    pub moisture_threshold: f64,
    #[serde(deserialize_with = "de_f64")]
    pub max_irrigation_minutes: f64,
    #[serde(default)]
    pub irrigation_mode: IrrigationMode,
}

impl Zone {
    /// Name for log lines; falls back to the id when the zone is unnamed.
    pub fn label(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("#{}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSensorReading {
    pub zone_id: RecordId,
    pub moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IrrigationLog {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub zone_id: RecordId,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub duration_minutes: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub litres_used: Option<f64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(deserialize_with = "de_utc")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIrrigationLog {
    pub zone_id: RecordId,
    pub duration_minutes: f64,
    pub litres_used: f64,
    pub mode: IrrigationMode,
}

impl NewIrrigationLog {
    pub fn new(zone_id: RecordId, minutes: f64, mode: IrrigationMode, flow_rate_lpm: f64) -> Self {
        NewIrrigationLog {
            zone_id,
            duration_minutes: minutes,
            litres_used: minutes * flow_rate_lpm,
            mode,
        }
    }
}

/// Creation time of a row, for lookups that only compare ages. Other columns
/// are ignored so unrelated nulls or unknown values cannot break the check.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Stamped {
    #[serde(deserialize_with = "de_utc")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlert {
    pub zone_id: RecordId,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IrrigationRequest {
    pub id: RecordId,
    pub zone_id: RecordId,
    #[serde(deserialize_with = "de_f64")]
    pub minutes: f64,
    pub status: RequestStatus,
    #[serde(deserialize_with = "de_utc")]
    pub created_at: DateTime<Utc>,
}
