//! Station Data Types
//!
//! The single device-state record reported by the charging station, and the
//! partial update a producer posts to change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{StationError, StationResult};

/// Maximum accepted length for a station identifier
pub const MAX_ID_LENGTH: usize = 64;

/// Operating status of the charging station
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    /// Idle and ready to charge
    Available,
    /// A vehicle is currently charging
    Charging,
    /// Under maintenance, not accepting sessions
    Maintenance,
    /// Not reporting
    #[default]
    Offline,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationStatus::Available => "available",
            StationStatus::Charging => "charging",
            StationStatus::Maintenance => "maintenance",
            StationStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StationStatus {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(StationStatus::Available),
            "charging" => Ok(StationStatus::Charging),
            "maintenance" => Ok(StationStatus::Maintenance),
            "offline" => Ok(StationStatus::Offline),
            other => Err(StationError::Validation(format!(
                "Unknown station status '{}'",
                other
            ))),
        }
    }
}

/// Current state of the charging station
///
/// Exactly one of these exists per [`StateStore`](super::StateStore). Readers
/// always receive an owned snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Stable device identifier
    pub id: String,
    /// Display label
    pub name: String,
    /// Operating status
    pub status: StationStatus,
    /// Battery level in percent (0-100)
    pub battery_level: f64,
    /// Charging power in kW
    pub charging_power: f64,
    /// Charging current in A
    pub charging_current: f64,
    /// Supply voltage in V
    pub voltage: f64,
    /// Temperature in °C
    pub temperature: f64,
    /// Minutes spent in the current charging session
    pub charging_time: u32,
    /// Time of the last accepted update, stamped by the store
    pub last_update: DateTime<Utc>,
    /// Position of this snapshot in the store's update order
    #[serde(skip)]
    pub revision: u64,
}

impl DeviceState {
    /// Create the initial state for a station that has not reported yet
    pub fn initial(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: StationStatus::Offline,
            battery_level: 0.0,
            charging_power: 0.0,
            charging_current: 0.0,
            voltage: 0.0,
            temperature: 0.0,
            charging_time: 0,
            last_update: Utc::now(),
            revision: 0,
        }
    }

    /// Overlay every field present in `update`, leaving the others untouched.
    ///
    /// Does not stamp `last_update` or `revision`; the store owns those.
    pub fn apply(&mut self, update: &StationUpdate) {
        if let Some(id) = &update.id {
            self.id = id.clone();
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(v) = update.battery_level {
            self.battery_level = v;
        }
        if let Some(v) = update.charging_power {
            self.charging_power = v;
        }
        if let Some(v) = update.charging_current {
            self.charging_current = v;
        }
        if let Some(v) = update.voltage {
            self.voltage = v;
        }
        if let Some(v) = update.temperature {
            self.temperature = v;
        }
        if let Some(v) = update.charging_time {
            self.charging_time = v;
        }
    }
}

/// Partial state posted by the producer
///
/// `id` and `status` are mandatory; every other field is optional and, when
/// absent, keeps its previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging_time: Option<u32>,
}

impl StationUpdate {
    /// Start an update with the two mandatory fields
    pub fn new(id: impl Into<String>, status: StationStatus) -> Self {
        Self {
            id: Some(id.into()),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn battery_level(mut self, value: f64) -> Self {
        self.battery_level = Some(value);
        self
    }

    pub fn charging_power(mut self, value: f64) -> Self {
        self.charging_power = Some(value);
        self
    }

    pub fn charging_current(mut self, value: f64) -> Self {
        self.charging_current = Some(value);
        self
    }

    pub fn voltage(mut self, value: f64) -> Self {
        self.voltage = Some(value);
        self
    }

    pub fn temperature(mut self, value: f64) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn charging_time(mut self, minutes: u32) -> Self {
        self.charging_time = Some(minutes);
        self
    }

    /// Check the update before it is allowed anywhere near the store
    pub fn validate(&self) -> StationResult<()> {
        let id = match self.id.as_deref() {
            None => return Err(StationError::Validation("Field 'id' is required".to_string())),
            Some(id) => id,
        };

        if self.status.is_none() {
            return Err(StationError::Validation(
                "Field 'status' is required".to_string(),
            ));
        }

        if id.trim().is_empty() {
            return Err(StationError::Validation(
                "Field 'id' cannot be empty".to_string(),
            ));
        }

        if id.chars().count() > MAX_ID_LENGTH {
            return Err(StationError::Validation(format!(
                "Field 'id' exceeds maximum length of {} characters",
                MAX_ID_LENGTH
            )));
        }

        let readings = [
            ("batteryLevel", self.battery_level),
            ("chargingPower", self.charging_power),
            ("chargingCurrent", self.charging_current),
            ("voltage", self.voltage),
            ("temperature", self.temperature),
        ];
        for (field, value) in readings {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(StationError::Validation(format!(
                        "Field '{}' must be a finite number",
                        field
                    )));
                }
            }
        }

        if let Some(level) = self.battery_level {
            if !(0.0..=100.0).contains(&level) {
                return Err(StationError::Validation(
                    "Field 'batteryLevel' must be between 0 and 100".to_string(),
                ));
            }
        }

        let non_negative = [
            ("chargingPower", self.charging_power),
            ("chargingCurrent", self.charging_current),
            ("voltage", self.voltage),
        ];
        for (field, value) in non_negative {
            if matches!(value, Some(v) if v < 0.0) {
                return Err(StationError::Validation(format!(
                    "Field '{}' cannot be negative",
                    field
                )));
            }
        }

        Ok(())
    }
}
