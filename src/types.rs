//! Typed snapshots of the vendor's JSON resources.
//!
//! The cloud API is loosely typed: numeric fields arrive as numbers or
//! numeric strings depending on hardware generation, ids arrive as numbers
//! or strings, and whole fields go missing on older firmware. Every field
//! here is optional (or leniently parsed) so that a partial payload never
//! fails deserialization.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a JSON number, a numeric string, or null.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts a JSON string or number and yields its string form.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Response of `GET {config_url}`, resolved once at client construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfiguration {
    pub api_base_url: String,
    #[serde(default)]
    pub auth_api_base_url: Option<String>,
}

/// One entry of the `InstallationsInfo` device list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub profile: Option<DeviceProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    /// Marketing model name ("Diplomat / Diplomat Duo").
    #[serde(default)]
    pub thermia_name: Option<String>,
    /// Internal model id ("DHP H/L/C 921").
    #[serde(default)]
    pub name: Option<String>,
}

/// `GET /api/v1/installations/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub last_online: Option<String>,
    #[serde(default)]
    pub time_zone_id: Option<String>,
    #[serde(default)]
    pub installation_profile_id: Option<i64>,
}

/// Live scalar readings from `GET /api/v1/installationstatus/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default, deserialize_with = "lenient_number")]
    pub heating_effect: Option<f64>,
    /// Pair of register ids; the second one is the writable target
    /// temperature register for this installation.
    #[serde(default)]
    pub heating_effect_registers: Option<Vec<i64>>,
    #[serde(default)]
    pub has_indoor_temp_sensor: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub indoor_temperature: Option<f64>,
    #[serde(default)]
    pub is_outdoor_temp_sensor_functioning: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub outdoor_temperature: Option<f64>,
    #[serde(default)]
    is_hot_water_active: Option<bool>,
    // Older firmware spells the same flag with a lowercase w.
    #[serde(default, rename = "isHotwaterActive")]
    is_hotwater_active_legacy: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub hot_water_temperature: Option<f64>,
}

impl DeviceStatus {
    pub fn hot_water_active(&self) -> Option<bool> {
        self.is_hot_water_active.or(self.is_hotwater_active_legacy)
    }
}

/// `GET /api/v1/installation/{id}/events?onlyActiveAlarms=false`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(default)]
    pub is_active_alarm: bool,
    #[serde(default)]
    pub event_title: Option<String>,
}

/// `GET /api/v1/installationprofiles/{id}/groups`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub name: String,
}

/// Registers with recorded history, from
/// `GET /api/v1/DataHistory/installation/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRegisters {
    #[serde(default)]
    pub registers: Vec<HistoricalRegister>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRegister {
    pub register_name: String,
    pub register_id: i64,
}

/// Minute-resolution history for one register.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalData {
    #[serde(default)]
    pub data: Vec<HistoricalEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalEntry {
    pub at: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub val: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tolerates_string_numbers() {
        let status: DeviceStatus = serde_json::from_str(
            r#"{"heatingEffect": "20", "outdoorTemperature": -3.5, "hotWaterTemperature": null}"#,
        )
        .unwrap();
        assert_eq!(status.heating_effect, Some(20.0));
        assert_eq!(status.outdoor_temperature, Some(-3.5));
        assert_eq!(status.hot_water_temperature, None);
    }

    #[test]
    fn hot_water_active_reads_both_spellings() {
        let status: DeviceStatus =
            serde_json::from_str(r#"{"isHotwaterActive": true}"#).unwrap();
        assert_eq!(status.hot_water_active(), Some(true));

        let status: DeviceStatus =
            serde_json::from_str(r#"{"isHotWaterActive": false}"#).unwrap();
        assert_eq!(status.hot_water_active(), Some(false));
    }

    #[test]
    fn device_summary_accepts_numeric_id() {
        let summary: DeviceSummary = serde_json::from_str(r#"{"id": 12345}"#).unwrap();
        assert_eq!(summary.id, "12345");
    }
}
