//! Thin endpoint client over the vendor's cloud REST API.
//!
//! Every method maps to exactly one endpoint. Error policy follows the
//! vendor portal's own behaviour: telemetry reads degrade gracefully (a
//! failed fetch is logged and yields an empty value, so one flaky endpoint
//! never takes down a whole refresh cycle), while schedule operations and
//! register writes that the caller explicitly requested surface their
//! failures.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::registers::{Register, RegisterGroup};
use crate::schedule::{CalendarFunction, CalendarSchedule};
use crate::types::{
    Alarm, ApiConfiguration, DeviceInfo, DeviceStatus, DeviceSummary, GroupInfo, HistoricalData,
    HistoricalRegisters,
};
use crate::{Error, Result};

/// Device lists arrive either as a bare array or wrapped in a page object,
/// depending on API generation.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum DeviceList {
    Plain(Vec<DeviceSummary>),
    Paged {
        #[serde(default)]
        items: Vec<DeviceSummary>,
    },
}

pub(crate) struct ThermiaApi {
    http: reqwest::Client,
    api_base_url: String,
    auth: Mutex<Authenticator>,
}

impl ThermiaApi {
    pub fn new(http: reqwest::Client, api_base_url: String, auth: Authenticator) -> Self {
        Self {
            http,
            api_base_url,
            auth: Mutex::new(auth),
        }
    }

    /// Resolves the environment's base URLs. Called once before the client
    /// exists; failure here is fatal.
    pub async fn fetch_configuration(
        http: &reqwest::Client,
        config_url: &str,
    ) -> Result<ApiConfiguration> {
        let response = http.get(config_url).send().await.map_err(Error::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("fetching API configuration from {config_url} failed"),
            });
        }
        response.json().await.map_err(|err| Error::Network {
            status: None,
            message: format!("invalid API configuration payload: {err}"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    /// Forces a session to exist. Used at construction so that bad
    /// credentials fail the connect instead of the first poll.
    pub async fn authenticate(&self) -> Result<()> {
        self.auth.lock().await.ensure_valid().await.map(|_| ())
    }

    /// Attaches a valid bearer token and sends. Token acquisition errors
    /// propagate; they mean every subsequent call would fail too.
    async fn send_authorized(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let token = self.auth.lock().await.ensure_valid().await?;
        builder.bearer_auth(token).send().await.map_err(Error::Http)
    }

    async fn get_authorized<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_authorized(self.http.get(self.url(path))).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("GET {path} failed: {body}"),
            });
        }
        response.json().await.map_err(|err| Error::Network {
            status: None,
            message: format!("GET {path} returned an unexpected payload: {err}"),
        })
    }

    /// Read with the lenient policy: failures are logged and flattened to
    /// `None` so a refresh cycle carries on with partial data.
    async fn get_lenient<T: DeserializeOwned>(&self, path: &str, what: &str) -> Option<T> {
        match self.get_authorized(path).await {
            Ok(value) => Some(value),
            Err(err) => {
                error!(error = %err, "fetching {what} failed");
                None
            }
        }
    }

    pub async fn get_devices(&self) -> Vec<DeviceSummary> {
        let list: Option<DeviceList> = self
            .get_lenient("/api/v1/InstallationsInfo/own", "device list")
            .await;
        match list {
            Some(DeviceList::Plain(devices)) => devices,
            Some(DeviceList::Paged { items }) => items,
            None => Vec::new(),
        }
    }

    pub async fn get_device_info(&self, device_id: &str) -> Option<DeviceInfo> {
        self.get_lenient(&format!("/api/v1/installations/{device_id}"), "device info")
            .await
    }

    pub async fn get_device_status(&self, device_id: &str) -> Option<DeviceStatus> {
        self.get_lenient(
            &format!("/api/v1/installationstatus/{device_id}/status"),
            "device status",
        )
        .await
    }

    pub async fn get_events(&self, device_id: &str) -> Vec<Alarm> {
        self.get_lenient(
            &format!("/api/v1/installation/{device_id}/events?onlyActiveAlarms=false"),
            "device events",
        )
        .await
        .unwrap_or_default()
    }

    pub async fn get_installation_profile_groups(&self, profile_id: i64) -> Vec<GroupInfo> {
        self.get_lenient(
            &format!("/api/v1/installationprofiles/{profile_id}/groups"),
            "installation profile groups",
        )
        .await
        .unwrap_or_default()
    }

    pub async fn get_register_group(
        &self,
        device_id: &str,
        group: RegisterGroup,
    ) -> Vec<Register> {
        self.get_register_group_by_name(device_id, group.as_str())
            .await
    }

    /// Fetches an arbitrary group by vendor name, for registers the
    /// interpreter has no special knowledge of.
    pub async fn get_register_group_by_name(
        &self,
        device_id: &str,
        group_name: &str,
    ) -> Vec<Register> {
        self.get_lenient(
            &format!("/api/v1/Registers/Installations/{device_id}/Groups/{group_name}"),
            group_name,
        )
        .await
        .unwrap_or_default()
    }

    pub async fn get_historical_registers(&self, device_id: &str) -> Option<HistoricalRegisters> {
        self.get_lenient(
            &format!("/api/v1/DataHistory/installation/{device_id}"),
            "historical register list",
        )
        .await
    }

    /// `start`/`end` must already be in the vendor's datetime format.
    pub async fn get_historical_data(
        &self,
        device_id: &str,
        register_id: i64,
        start: &str,
        end: &str,
    ) -> Option<HistoricalData> {
        self.get_lenient(
            &format!(
                "/api/v1/datahistory/installation/{device_id}/register/{register_id}/minute?periodStart={start}&periodEnd={end}"
            ),
            "historical data",
        )
        .await
    }

    /// Writes one register. Failures are logged but not raised; callers
    /// re-fetch afterwards, so the device model reflects what the pump
    /// actually accepted either way.
    pub async fn set_register_value(&self, device_id: &str, register_index: i64, value: f64) {
        let path = format!("/api/v1/Registers/Installations/{device_id}/Registers");
        let body = json!({
            "registerIndex": register_index,
            "registerValue": value,
            "clientUuid": Uuid::new_v4().to_string(),
        });
        debug!(device_id, register_index, value, "writing register");
        let result = self
            .send_authorized(self.http.post(self.url(&path)).json(&body))
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                error!(
                    device_id,
                    register_index,
                    status = response.status().as_u16(),
                    "register write rejected"
                );
            }
            Err(err) => {
                error!(device_id, register_index, error = %err, "register write failed");
            }
        }
    }

    // Schedule operations raise: the caller asked for a specific mutation
    // or record and silent failure would be misleading.

    pub async fn get_calendar_functions(&self, device_id: &str) -> Result<Vec<CalendarFunction>> {
        self.get_authorized(&format!(
            "/api/v1/installations/{device_id}/calendarFunctions"
        ))
        .await
    }

    pub async fn get_schedules(&self, device_id: &str) -> Result<Vec<CalendarSchedule>> {
        self.get_authorized(&format!("/api/v1/installations/{device_id}/schedules"))
            .await
    }

    pub async fn get_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<CalendarSchedule> {
        self.get_authorized(&format!(
            "/api/v1/installations/{device_id}/schedules/{schedule_id}"
        ))
        .await
    }

    pub async fn create_schedule(
        &self,
        device_id: &str,
        schedule: &CalendarSchedule,
    ) -> Result<CalendarSchedule> {
        let path = format!("/api/v1/installations/{device_id}/schedules");
        let response = self
            .send_authorized(self.http.post(self.url(&path)).json(schedule))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("creating schedule failed: {body}"),
            });
        }
        response.json().await.map_err(|err| Error::Network {
            status: None,
            message: format!("unexpected create-schedule response: {err}"),
        })
    }

    pub async fn delete_schedule(&self, device_id: &str, schedule_id: i64) -> Result<()> {
        let path = format!("/api/v1/installations/{device_id}/schedules/{schedule_id}");
        let response = self
            .send_authorized(self.http.delete(self.url(&path)))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("deleting schedule {schedule_id} failed: {body}"),
            });
        }
        Ok(())
    }
}
