//! Schedule and calendar-function records.
//!
//! Passive data holders round-tripped to/from the vendor's schedule
//! resource. No interpretation logic beyond field mapping and the vendor's
//! fixed date format.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Date pattern used throughout the schedule and history endpoints.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Calendar function ids.
pub const CAL_FUNCTION_REDUCED_HEATING_EFFECT: i64 = 15001;
pub const CAL_FUNCTION_HOT_WATER_BLOCK: i64 = 15002;
pub const CAL_FUNCTION_SILENT_MODE: i64 = 15003;
pub const CAL_FUNCTION_EVU_MODE: i64 = 15004;

/// One scheduled activation of a calendar function.
///
/// `is_running`, `is_faulty`, `is_paused` and `id` are only populated on
/// schedules fetched from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub installation_id: i64,
    pub function_id: i64,
    #[serde(default, with = "vendor_datetime")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, with = "vendor_datetime")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub recurring_type: i64,
    #[serde(default = "default_occurrence")]
    pub recurring_occurrence: i64,
    /// Function-based value, e.g. the setpoint for reduced heating effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_faulty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
}

fn default_occurrence() -> i64 {
    1
}

impl CalendarSchedule {
    pub fn new(function_id: i64, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id: None,
            installation_id: 0,
            function_id,
            start: Some(start),
            end: Some(end),
            recurring_type: 0,
            recurring_occurrence: 1,
            value: None,
            is_running: None,
            is_faulty: None,
            is_paused: None,
        }
    }
}

/// A calendar function supported by an installation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFunction {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub recurring_enabled: bool,
    #[serde(default)]
    pub can_be_paused: bool,
    #[serde(default)]
    pub has_function_based_value: bool,
    #[serde(default)]
    pub is_temperature_overriden: bool,
    #[serde(default)]
    pub properties: Option<CalendarFunctionProperties>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarFunctionProperties {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

mod vendor_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(DATETIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.is_empty() => {
                // Some endpoints append fractional seconds.
                let trimmed = s.split('.').next().unwrap_or(&s);
                NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn serializes_with_vendor_date_format() {
        let mut schedule =
            CalendarSchedule::new(CAL_FUNCTION_HOT_WATER_BLOCK, dt(2024, 3, 1, 6, 30), dt(2024, 3, 1, 8, 0));
        schedule.installation_id = 42;
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["start"], "2024-03-01T06:30:00");
        assert_eq!(json["end"], "2024-03-01T08:00:00");
        assert_eq!(json["functionId"], 15002);
        assert_eq!(json["installationId"], 42);
        // Fields unset locally must not be sent at all.
        assert!(json.get("id").is_none());
        assert!(json.get("isRunning").is_none());
        assert!(json.get("value").is_none());
    }

    #[test]
    fn deserializes_api_payload() {
        let schedule: CalendarSchedule = serde_json::from_str(
            r#"{
                "id": 7,
                "installationId": 42,
                "functionId": 15001,
                "start": "2024-03-01T06:30:00.1234567",
                "end": "2024-03-01T08:00:00",
                "recurringType": 1,
                "recurringOccurrence": 2,
                "value": 18.5,
                "isRunning": true,
                "isFaulty": false,
                "isPaused": false
            }"#,
        )
        .unwrap();
        assert_eq!(schedule.id, Some(7));
        assert_eq!(schedule.start, Some(dt(2024, 3, 1, 6, 30)));
        assert_eq!(schedule.value, Some(18.5));
        assert_eq!(schedule.is_running, Some(true));
    }

    #[test]
    fn missing_dates_deserialize_as_none() {
        let schedule: CalendarSchedule = serde_json::from_str(
            r#"{"installationId": 1, "functionId": 15003, "recurringType": 0, "recurringOccurrence": 1}"#,
        )
        .unwrap();
        assert!(schedule.start.is_none());
        assert!(schedule.end.is_none());
        assert_eq!(schedule.recurring_occurrence, 1);
    }

    #[test]
    fn calendar_function_parses_nested_properties() {
        let function: CalendarFunction = serde_json::from_str(
            r#"{
                "id": 15001,
                "name": "Reduced heating effect",
                "recurringEnabled": true,
                "canBePaused": false,
                "hasFunctionBasedValue": true,
                "isTemperatureOverriden": true,
                "properties": {"type": "temperature", "value": "20"}
            }"#,
        )
        .unwrap();
        assert_eq!(function.id, CAL_FUNCTION_REDUCED_HEATING_EFFECT);
        assert!(function.has_function_based_value);
        assert_eq!(function.properties.unwrap().kind, "temperature");
    }
}
