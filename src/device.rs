//! Per-device read model and write mediator.
//!
//! A `HeatPump` owns the latest fetched snapshot of one installation:
//! info, live status, the five register groups, alarms, plus the derived
//! interpreter outputs (operation mode, switches, status maps) and the
//! cached register-index bindings. `update_data` refetches everything in a
//! fixed order; every mutator optimistically patches the local snapshot,
//! issues the remote write, then refetches in full so the model always
//! converges on what the pump actually accepted.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::api::ThermiaApi;
use crate::registers::{
    self, COMP_POWER_STATUS, HotWaterSwitch, OperationMode, POWER_STATUS_PREFIX,
    REG_ACTUAL_POOL_TEMP, REG_BRINE_IN, REG_BRINE_OUT, REG_COOL_SENSOR_SUPPLY,
    REG_COOL_SENSOR_TANK, REG_DESIRED_SUPPLY_LINE, REG_DESIRED_SUPPLY_LINE_TEMP,
    REG_DESIRED_SYS_SUPPLY_LINE_TEMP, REG_HOT_WATER_BOOST, REG_HOT_WATER_STATUS,
    REG_INTEGRAL_LSD, REG_OPER_DATA_BUFFER_TANK, REG_OPER_DATA_RETURN,
    REG_OPER_DATA_SUPPLY_MA_SA, REG_OPER_TIME_COMPRESSOR, REG_OPER_TIME_HEATING,
    REG_OPER_TIME_HOT_WATER, REG_OPER_TIME_IMM1, REG_OPER_TIME_IMM2, REG_OPER_TIME_IMM3,
    REG_PID, REG_RETURN_LINE, REG_SUPPLY_LINE, Register, RegisterData, RegisterGroup,
    StatusDialect,
};
use crate::schedule::{CalendarFunction, CalendarSchedule, DATETIME_FORMAT};
use crate::types::{DeviceInfo, DeviceStatus, DeviceSummary};
use crate::{Error, Result};

/// One timestamped sample of a register's history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDataPoint {
    pub time: NaiveDateTime,
    pub value: f64,
}

pub struct HeatPump {
    api: Arc<ThermiaApi>,
    id: String,
    summary: Option<DeviceSummary>,
    info: Option<DeviceInfo>,
    status: Option<DeviceStatus>,

    group_temperatures: Vec<Register>,
    group_operational_status: Vec<Register>,
    group_operational_time: Vec<Register>,

    operation_mode: Option<OperationMode>,
    /// Fallback when the operation group lacks the mode register: the same
    /// register read out of the status group, never writable.
    operation_mode_read_only: Option<OperationMode>,
    hot_water_switch: Option<HotWaterSwitch>,
    hot_water_boost_switch: Option<HotWaterSwitch>,

    alarms: Vec<crate::types::Alarm>,

    /// `heatingEffectRegisters[1]`, the writable target-temperature
    /// register for this installation.
    temperature_register: Option<i64>,
    /// Probed once; the dialect is a hardware-fixed property.
    status_dialect: Option<&'static StatusDialect>,
    operational_status_map: BTreeMap<i64, String>,
    running_operational_statuses: Vec<String>,
    power_status_map: BTreeMap<i64, String>,
    running_power_statuses: Vec<String>,

    historical_registers: Option<BTreeMap<String, i64>>,
}

impl HeatPump {
    pub(crate) async fn init(summary: DeviceSummary, api: Arc<ThermiaApi>) -> Self {
        let mut pump = Self {
            api,
            id: summary.id.clone(),
            summary: Some(summary),
            info: None,
            status: None,
            group_temperatures: Vec::new(),
            group_operational_status: Vec::new(),
            group_operational_time: Vec::new(),
            operation_mode: None,
            operation_mode_read_only: None,
            hot_water_switch: None,
            hot_water_boost_switch: None,
            alarms: Vec::new(),
            temperature_register: None,
            status_dialect: None,
            operational_status_map: BTreeMap::new(),
            running_operational_statuses: Vec::new(),
            power_status_map: BTreeMap::new(),
            running_power_statuses: Vec::new(),
            historical_registers: None,
        };
        pump.update_data().await;
        pump
    }

    /// Refetches everything and re-derives the interpreter outputs. The
    /// order matters: the temperature register binding comes from the
    /// status snapshot and must be resolved before the group reads that
    /// depend on it.
    pub async fn update_data(&mut self) {
        self.info = self.api.get_device_info(&self.id).await;
        self.status = self.api.get_device_status(&self.id).await;
        self.summary = self.refetch_summary().await.or(self.summary.take());

        self.temperature_register = self
            .status
            .as_ref()
            .and_then(|s| s.heating_effect_registers.as_ref())
            .and_then(|regs| regs.get(1).copied());

        self.group_temperatures = self
            .api
            .get_register_group(&self.id, RegisterGroup::Temperatures)
            .await;
        self.group_operational_status = self
            .api
            .get_register_group(&self.id, RegisterGroup::OperationalStatus)
            .await;
        self.group_operational_time = self
            .api
            .get_register_group(&self.id, RegisterGroup::OperationalTime)
            .await;

        let group_operation = self
            .api
            .get_register_group(&self.id, RegisterGroup::OperationalOperation)
            .await;
        self.operation_mode = registers::resolve_operation_mode(&group_operation);
        self.operation_mode_read_only = if self.operation_mode.is_none() {
            registers::resolve_operation_mode(&self.group_operational_status)
        } else {
            None
        };

        let group_hot_water = self
            .api
            .get_register_group(&self.id, RegisterGroup::HotWater)
            .await;
        self.hot_water_switch = registers::resolve_switch(&group_hot_water, REG_HOT_WATER_STATUS);
        self.hot_water_boost_switch =
            registers::resolve_switch(&group_hot_water, REG_HOT_WATER_BOOST);

        self.alarms = self.api.get_events(&self.id).await;

        self.derive_statuses();
    }

    async fn refetch_summary(&self) -> Option<DeviceSummary> {
        self.api
            .get_devices()
            .await
            .into_iter()
            .find(|device| device.id == self.id)
    }

    fn derive_statuses(&mut self) {
        if self.status_dialect.is_none() {
            self.status_dialect = registers::probe_status_dialect(&self.group_operational_status);
        }

        self.operational_status_map = BTreeMap::new();
        self.running_operational_statuses = Vec::new();
        if let Some(dialect) = self.status_dialect {
            if let Some(data) =
                registers::find_register(&self.group_operational_status, dialect.register_name)
            {
                self.operational_status_map =
                    registers::build_value_name_map(&data.value_names, dialect.value_name_prefix);
                if let Some(current) = data.value_as_int() {
                    self.running_operational_statuses = registers::decode_composite(
                        &self.operational_status_map,
                        current,
                        dialect.baseline,
                    );
                }
            }
        }

        self.power_status_map = BTreeMap::new();
        self.running_power_statuses = Vec::new();
        if let Some(data) =
            registers::find_register(&self.group_operational_status, COMP_POWER_STATUS)
        {
            self.power_status_map =
                registers::build_value_name_map(&data.value_names, POWER_STATUS_PREFIX);
            if let Some(current) = data.value_as_int() {
                self.running_power_statuses =
                    registers::decode_composite(&self.power_status_map, current, 0);
            }
        }
    }

    // Mutators. Each validates its register binding, patches the local
    // snapshot, writes, then refetches in full.

    pub async fn set_temperature(&mut self, temperature: f64) {
        let Some(register_index) = self.temperature_register else {
            error!(device_id = %self.id, "temperature register not available, cannot set temperature");
            return;
        };
        if !apply_heating_effect(&mut self.status, temperature) {
            error!(device_id = %self.id, "status not available, cannot set temperature");
            return;
        }
        info!(device_id = %self.id, temperature, "setting temperature");
        self.api
            .set_register_value(&self.id, register_index, temperature)
            .await;
        self.update_data().await;
    }

    /// Resolves `mode` through the cached label map. An unknown label or a
    /// read-only mode register logs and no-ops.
    pub async fn set_operation_mode(&mut self, mode: &str) {
        let Some(current_mode) = self.operation_mode.as_mut() else {
            error!(device_id = %self.id, "operation mode is not settable on this installation");
            return;
        };
        if current_mode.is_read_only {
            error!(device_id = %self.id, "operation mode register is read only");
            return;
        }
        let Some(register_index) = current_mode.register_index else {
            error!(device_id = %self.id, "operation mode register index not available");
            return;
        };
        let Some(value) = current_mode
            .available
            .iter()
            .find_map(|(value, label)| (label == mode).then_some(*value))
        else {
            error!(device_id = %self.id, mode, "unknown operation mode");
            return;
        };

        info!(device_id = %self.id, mode, "setting operation mode");
        current_mode.current = mode.to_string();
        self.api
            .set_register_value(&self.id, register_index, value as f64)
            .await;
        self.update_data().await;
    }

    pub async fn set_hot_water_switch_state(&mut self, state: i64) {
        let Some(switch) = self.hot_water_switch.as_mut() else {
            error!(device_id = %self.id, "hot water switch not available");
            return;
        };
        let Some(register_index) = switch.register_index else {
            error!(device_id = %self.id, "hot water switch register index not available");
            return;
        };
        info!(device_id = %self.id, state, "setting hot water switch");
        switch.value = state;
        self.api
            .set_register_value(&self.id, register_index, state as f64)
            .await;
        self.update_data().await;
    }

    pub async fn set_hot_water_boost_switch_state(&mut self, state: i64) {
        let Some(switch) = self.hot_water_boost_switch.as_mut() else {
            error!(device_id = %self.id, "hot water boost switch not available");
            return;
        };
        let Some(register_index) = switch.register_index else {
            error!(device_id = %self.id, "hot water boost switch register index not available");
            return;
        };
        info!(device_id = %self.id, state, "setting hot water boost switch");
        switch.value = state;
        self.api
            .set_register_value(&self.id, register_index, state as f64)
            .await;
        self.update_data().await;
    }

    // Generic register access, for groups the interpreter has no special
    // knowledge of.

    pub async fn get_all_available_register_groups(&self) -> Vec<String> {
        let Some(profile_id) = self.info.as_ref().and_then(|i| i.installation_profile_id) else {
            return Vec::new();
        };
        self.api
            .get_installation_profile_groups(profile_id)
            .await
            .into_iter()
            .map(|group| group.name)
            .collect()
    }

    pub async fn get_available_registers_for_group(&self, group_name: &str) -> Vec<String> {
        self.api
            .get_register_group_by_name(&self.id, group_name)
            .await
            .into_iter()
            .map(|register| register.register_name)
            .collect()
    }

    pub async fn get_register_data_by_group_and_name(
        &self,
        group_name: &str,
        register_name: &str,
    ) -> Option<RegisterData> {
        let group = self
            .api
            .get_register_group_by_name(&self.id, group_name)
            .await;
        if group.is_empty() {
            error!(device_id = %self.id, group_name, "no register group data");
            return None;
        }
        registers::register_data_by_name(&group, register_name)
    }

    pub async fn set_register_data_by_group_and_name(
        &mut self,
        group_name: &str,
        register_name: &str,
        value: f64,
    ) {
        let Some(data) = self
            .get_register_data_by_group_and_name(group_name, register_name)
            .await
        else {
            error!(
                device_id = %self.id,
                group_name, register_name, "register not found, cannot set value"
            );
            return;
        };
        self.api.set_register_value(&self.id, data.id, value).await;
        self.update_data().await;
    }

    // Identity and info properties.

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.name.as_deref())
    }

    pub fn is_online(&self) -> Option<bool> {
        self.info.as_ref().and_then(|i| i.is_online)
    }

    pub fn last_online(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.last_online.as_deref())
    }

    pub fn installation_timezone(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.time_zone_id.as_deref())
    }

    /// Marketing model name, e.g. "Diplomat / Diplomat Duo".
    pub fn model(&self) -> Option<&str> {
        self.summary
            .as_ref()
            .and_then(|d| d.profile.as_ref())
            .and_then(|p| p.thermia_name.as_deref())
    }

    /// Internal model id, e.g. "DHP H/L/C 921".
    pub fn model_id(&self) -> Option<&str> {
        self.summary
            .as_ref()
            .and_then(|d| d.profile.as_ref())
            .and_then(|p| p.name.as_deref())
    }

    // Status properties.

    pub fn has_indoor_temp_sensor(&self) -> Option<bool> {
        self.status.as_ref().and_then(|s| s.has_indoor_temp_sensor)
    }

    /// Without an indoor sensor the target temperature doubles as the best
    /// available indoor reading.
    pub fn indoor_temperature(&self) -> Option<f64> {
        if self.has_indoor_temp_sensor() == Some(true) {
            self.status.as_ref().and_then(|s| s.indoor_temperature)
        } else {
            self.heat_temperature()
        }
    }

    pub fn is_outdoor_temp_sensor_functioning(&self) -> Option<bool> {
        self.status
            .as_ref()
            .and_then(|s| s.is_outdoor_temp_sensor_functioning)
    }

    pub fn outdoor_temperature(&self) -> Option<f64> {
        self.status.as_ref().and_then(|s| s.outdoor_temperature)
    }

    pub fn is_hot_water_active(&self) -> Option<bool> {
        self.status.as_ref().and_then(|s| s.hot_water_active())
    }

    pub fn hot_water_temperature(&self) -> Option<f64> {
        self.status.as_ref().and_then(|s| s.hot_water_temperature)
    }

    // Heat temperature data.

    pub fn heat_temperature(&self) -> Option<f64> {
        self.status.as_ref().and_then(|s| s.heating_effect)
    }

    pub fn heat_min_temperature_value(&self) -> Option<f64> {
        self.heat_temperature_data().and_then(|d| d.min_value)
    }

    pub fn heat_max_temperature_value(&self) -> Option<f64> {
        self.heat_temperature_data().and_then(|d| d.max_value)
    }

    pub fn heat_temperature_step(&self) -> Option<f64> {
        self.heat_temperature_data().and_then(|d| d.step)
    }

    fn heat_temperature_data(&self) -> Option<&Register> {
        heat_temperature_data(&self.group_temperatures, self.temperature_register)
    }

    // Other temperature data. Register names differ per hardware family,
    // hence the fallback chains.

    pub fn supply_line_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_SUPPLY_LINE)
            .or_else(|| self.temperature_value(REG_OPER_DATA_SUPPLY_MA_SA))
    }

    pub fn desired_supply_line_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_DESIRED_SUPPLY_LINE)
            .or_else(|| self.temperature_value(REG_DESIRED_SUPPLY_LINE_TEMP))
            .or_else(|| self.temperature_value(REG_DESIRED_SYS_SUPPLY_LINE_TEMP))
    }

    pub fn return_line_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_RETURN_LINE)
            .or_else(|| self.temperature_value(REG_OPER_DATA_RETURN))
    }

    pub fn buffer_tank_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_OPER_DATA_BUFFER_TANK)
    }

    pub fn brine_out_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_BRINE_OUT)
    }

    pub fn brine_in_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_BRINE_IN)
    }

    pub fn pool_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_ACTUAL_POOL_TEMP)
    }

    pub fn cooling_tank_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_COOL_SENSOR_TANK)
    }

    pub fn cooling_supply_line_temperature(&self) -> Option<f64> {
        self.temperature_value(REG_COOL_SENSOR_SUPPLY)
    }

    fn temperature_value(&self, register_name: &str) -> Option<f64> {
        registers::find_register(&self.group_temperatures, register_name)
            .and_then(|r| r.register_value)
    }

    // Operational status.

    pub fn running_operational_statuses(&self) -> &[String] {
        &self.running_operational_statuses
    }

    pub fn available_operational_statuses(&self) -> Vec<String> {
        self.operational_status_map.values().cloned().collect()
    }

    pub fn available_operational_statuses_map(&self) -> &BTreeMap<i64, String> {
        &self.operational_status_map
    }

    pub fn running_power_statuses(&self) -> &[String] {
        &self.running_power_statuses
    }

    pub fn available_power_statuses(&self) -> Vec<String> {
        self.power_status_map.values().cloned().collect()
    }

    pub fn available_power_statuses_map(&self) -> &BTreeMap<i64, String> {
        &self.power_status_map
    }

    pub fn operational_status_integral(&self) -> Option<f64> {
        registers::find_register(&self.group_operational_status, REG_INTEGRAL_LSD)
            .and_then(|r| r.register_value)
    }

    pub fn operational_status_pid(&self) -> Option<f64> {
        registers::find_register(&self.group_operational_status, REG_PID)
            .and_then(|r| r.register_value)
    }

    // Operational time data.

    pub fn compressor_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_COMPRESSOR)
    }

    pub fn heating_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_HEATING)
    }

    pub fn hot_water_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_HOT_WATER)
    }

    pub fn auxiliary_heater_1_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_IMM1)
    }

    pub fn auxiliary_heater_2_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_IMM2)
    }

    pub fn auxiliary_heater_3_operational_time(&self) -> Option<f64> {
        self.operational_time_value(REG_OPER_TIME_IMM3)
    }

    fn operational_time_value(&self, register_name: &str) -> Option<f64> {
        registers::find_register(&self.group_operational_time, register_name)
            .and_then(|r| r.register_value)
    }

    // Operation mode.

    fn resolved_operation_mode(&self) -> Option<&OperationMode> {
        self.operation_mode
            .as_ref()
            .or(self.operation_mode_read_only.as_ref())
    }

    pub fn operation_mode(&self) -> Option<&str> {
        self.resolved_operation_mode()
            .map(|mode| mode.current.as_str())
    }

    pub fn available_operation_modes(&self) -> Vec<String> {
        self.resolved_operation_mode()
            .map(|mode| mode.available.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn available_operation_mode_map(&self) -> Option<&BTreeMap<i64, String>> {
        self.resolved_operation_mode().map(|mode| &mode.available)
    }

    pub fn is_operation_mode_read_only(&self) -> Option<bool> {
        if let Some(mode) = self.operation_mode.as_ref() {
            return Some(mode.is_read_only);
        }
        if self.operation_mode_read_only.is_some() {
            return Some(true);
        }
        None
    }

    // Hot water.

    pub fn hot_water_switch_state(&self) -> Option<i64> {
        self.hot_water_switch.map(|s| s.value)
    }

    pub fn hot_water_boost_switch_state(&self) -> Option<i64> {
        self.hot_water_boost_switch.map(|s| s.value)
    }

    // Alarms.

    pub fn active_alarm_count(&self) -> usize {
        active_alarms(&self.alarms).count()
    }

    pub fn active_alarms(&self) -> Vec<String> {
        active_alarms(&self.alarms)
            .filter_map(|alarm| alarm.event_title.clone())
            .collect()
    }

    // Historical data. The register-name-to-id map is fetched lazily and
    // then kept for the device's lifetime.

    pub async fn historical_data_registers(&mut self) -> Vec<String> {
        self.ensure_historical_registers().await;
        self.historical_registers
            .as_ref()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get_historical_data_for_register(
        &mut self,
        register_name: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<HistoricalDataPoint> {
        self.ensure_historical_registers().await;
        let Some(register_id) = self
            .historical_registers
            .as_ref()
            .and_then(|map| map.get(register_name).copied())
        else {
            error!(device_id = %self.id, register_name, "register has no historical data");
            return Vec::new();
        };

        let data = self
            .api
            .get_historical_data(
                &self.id,
                register_id,
                &start.format(DATETIME_FORMAT).to_string(),
                &end.format(DATETIME_FORMAT).to_string(),
            )
            .await;

        let Some(data) = data else {
            return Vec::new();
        };
        data.data
            .iter()
            .filter_map(|entry| {
                let trimmed = entry.at.split('.').next().unwrap_or(&entry.at);
                let time = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT).ok()?;
                Some(HistoricalDataPoint {
                    time,
                    value: entry.val?,
                })
            })
            .collect()
    }

    async fn ensure_historical_registers(&mut self) {
        if self.historical_registers.is_some() {
            return;
        }
        let map = self
            .api
            .get_historical_registers(&self.id)
            .await
            .map(|data| {
                data.registers
                    .into_iter()
                    .map(|register| (register.register_name, register.register_id))
                    .collect()
            })
            .unwrap_or_default();
        self.historical_registers = Some(map);
    }

    // Schedules and calendar functions. These raise on failure; they are
    // explicit user actions, not polling reads.

    pub async fn get_supported_calendar_functions(&self) -> Result<Vec<CalendarFunction>> {
        self.api.get_calendar_functions(&self.id).await
    }

    pub async fn get_schedules(&self) -> Result<Vec<CalendarSchedule>> {
        self.api.get_schedules(&self.id).await
    }

    pub async fn get_schedule_by_id(&self, schedule_id: i64) -> Result<CalendarSchedule> {
        self.api.get_schedule(&self.id, schedule_id).await
    }

    pub async fn add_new_schedule(
        &self,
        mut schedule: CalendarSchedule,
    ) -> Result<CalendarSchedule> {
        if let Ok(installation_id) = self.id.parse() {
            schedule.installation_id = installation_id;
        }
        self.api.create_schedule(&self.id, &schedule).await
    }

    pub async fn delete_schedule(&self, schedule: &CalendarSchedule) -> Result<()> {
        let schedule_id = schedule.id.ok_or_else(|| Error::Network {
            status: None,
            message: "schedule has no id, cannot delete".to_string(),
        })?;
        self.api.delete_schedule(&self.id, schedule_id).await
    }
}

/// Locates the target-temperature register in the temperatures group by the
/// register id announced in the status snapshot. Ambiguity means the feature
/// is unsupported.
fn heat_temperature_data(group: &[Register], register_id: Option<i64>) -> Option<&Register> {
    let register_id = register_id?;
    let mut matches = group.iter().filter(|r| r.register_id == Some(register_id));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

/// Optimistic local patch for the target temperature. Returns false when no
/// status snapshot exists to patch.
fn apply_heating_effect(status: &mut Option<DeviceStatus>, temperature: f64) -> bool {
    match status {
        Some(status) => {
            status.heating_effect = Some(temperature);
            true
        }
        None => false,
    }
}

fn active_alarms(alarms: &[crate::types::Alarm]) -> impl Iterator<Item = &crate::types::Alarm> {
    alarms.iter().filter(|alarm| alarm.is_active_alarm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alarm;

    fn temperature_register(id: i64) -> Register {
        serde_json::from_value(serde_json::json!({
            "registerId": id,
            "registerIndex": 100 + id,
            "registerName": "REG_HEATING_EFFECT",
            "registerValue": 20.0,
            "isReadOnly": false,
            "minValue": 5.0,
            "maxValue": 35.0,
            "step": 0.5,
        }))
        .unwrap()
    }

    #[test]
    fn heat_temperature_data_requires_unique_id_match() {
        let group = vec![temperature_register(7), temperature_register(9)];
        let data = heat_temperature_data(&group, Some(9)).unwrap();
        assert_eq!(data.min_value, Some(5.0));

        assert!(heat_temperature_data(&group, Some(3)).is_none());
        assert!(heat_temperature_data(&group, None).is_none());

        let duplicated = vec![temperature_register(7), temperature_register(7)];
        assert!(heat_temperature_data(&duplicated, Some(7)).is_none());
    }

    #[test]
    fn optimistic_temperature_patch() {
        let mut status: Option<DeviceStatus> =
            Some(serde_json::from_str(r#"{"heatingEffect": 20}"#).unwrap());
        assert!(apply_heating_effect(&mut status, 19.0));
        assert_eq!(status.unwrap().heating_effect, Some(19.0));

        let mut missing: Option<DeviceStatus> = None;
        assert!(!apply_heating_effect(&mut missing, 19.0));
    }

    #[test]
    fn active_alarm_filter() {
        let alarms: Vec<Alarm> = serde_json::from_str(
            r#"[
                {"isActiveAlarm": true, "eventTitle": "Low brine flow"},
                {"isActiveAlarm": false, "eventTitle": "Resolved"},
                {"isActiveAlarm": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(active_alarms(&alarms).count(), 2);
        let titles: Vec<_> = active_alarms(&alarms)
            .filter_map(|a| a.event_title.clone())
            .collect();
        assert_eq!(titles, vec!["Low brine flow"]);
    }
}
