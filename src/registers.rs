//! Register-group interpretation.
//!
//! Heat pumps expose their state as named registers bundled into groups.
//! Which register carries a given concept, and how its enumerated values
//! are prefixed, differs per hardware generation ("dialect"). This module
//! resolves the dialect, decodes enumerated value maps and bitmask-composite
//! statuses, and locates the writable register index for each controllable
//! feature. A missing or ambiguous register always means "feature not
//! supported on this hardware", never an error.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::lenient_number;

pub const REG_GROUP_TEMPERATURES: &str = "REG_GROUP_TEMPERATURES";
pub const REG_GROUP_OPERATIONAL_STATUS: &str = "REG_GROUP_OPERATIONAL_STATUS";
pub const REG_GROUP_OPERATIONAL_TIME: &str = "REG_GROUP_OPERATIONAL_TIME";
pub const REG_GROUP_OPERATIONAL_OPERATION: &str = "REG_GROUP_OPERATIONAL_OPERATION";
pub const REG_GROUP_HOT_WATER: &str = "REG_GROUP_HOT_WATER";

// Temperature registers.
pub const REG_INDOOR_TEMPERATURE: &str = "REG_INDOOR_TEMPERATURE";
pub const REG_SUPPLY_LINE: &str = "REG_SUPPLY_LINE";
pub const REG_HOT_WATER_TEMPERATURE: &str = "REG_HOT_WATER_TEMPERATURE";
pub const REG_BRINE_OUT: &str = "REG_BRINE_OUT";
pub const REG_BRINE_IN: &str = "REG_BRINE_IN";
pub const REG_OPER_DATA_BUFFER_TANK: &str = "REG_OPER_DATA_BUFFER_TANK";

// Temperature registers ("classic" hardware family).
pub const REG_RETURN_LINE: &str = "REG_RETURN_LINE";
pub const REG_DESIRED_SUPPLY_LINE: &str = "REG_DESIRED_SUPPLY_LINE";
pub const REG_OPER_DATA_SUPPLY_MA_SA: &str = "REG_OPER_DATA_SUPPLY_MA_SA";
pub const REG_DESIRED_SUPPLY_LINE_TEMP: &str = "REG_DESIRED_SUPPLY_LINE_TEMP";
pub const REG_DESIRED_INDOOR_TEMPERATURE: &str = "REG_DESIRED_INDOOR_TEMPERATURE";

// Temperature registers ("genesis" hardware family).
pub const REG_OPER_DATA_RETURN: &str = "REG_OPER_DATA_RETURN";
pub const REG_DESIRED_SYS_SUPPLY_LINE_TEMP: &str = "REG_DESIRED_SYS_SUPPLY_LINE_TEMP";
pub const REG_COOL_SENSOR_TANK: &str = "REG_COOL_SENSOR_TANK";
pub const REG_COOL_SENSOR_SUPPLY: &str = "REG_COOL_SENSOR_SUPPLY";
pub const REG_ACTUAL_POOL_TEMP: &str = "REG_ACTUAL_POOL_TEMP";

// Operational operation registers.
pub const REG_OPERATIONMODE: &str = "REG_OPERATIONMODE";

// Operational status registers.
pub const REG_OPERATIONAL_STATUS_PRIO1: &str = "REG_OPERATIONAL_STATUS_PRIO1";
pub const COMP_STATUS: &str = "COMP_STATUS";
pub const COMP_STATUS_ATEC: &str = "COMP_STATUS_ATEC";
pub const COMP_STATUS_ITEC: &str = "COMP_STATUS_ITEC";
pub const REG_OPERATIONAL_STATUS_PRIORITY_BITMASK: &str =
    "REG_OPERATIONAL_STATUS_PRIORITY_BITMASK";
pub const REG_INTEGRAL_LSD: &str = "REG_INTEGRAL_LSD";
pub const REG_PID: &str = "REG_PID";
pub const COMP_POWER_STATUS: &str = "COMP_POWER_STATUS";

// Hot water registers.
pub const REG_HOT_WATER_STATUS: &str = "REG_HOT_WATER_STATUS";
pub const REG_HOT_WATER_BOOST: &str = "REG__HOT_WATER_BOOST";

// Operational time registers.
pub const REG_OPER_TIME_IMM1: &str = "REG_OPER_TIME_IMM1";
pub const REG_OPER_TIME_IMM2: &str = "REG_OPER_TIME_IMM2";
pub const REG_OPER_TIME_IMM3: &str = "REG_OPER_TIME_IMM3";
pub const REG_OPER_TIME_COMPRESSOR: &str = "REG_OPER_TIME_COMPRESSOR";
pub const REG_OPER_TIME_HEATING: &str = "REG_OPER_TIME_HEATING";
pub const REG_OPER_TIME_HOT_WATER: &str = "REG_OPER_TIME_HOT_WATER";

pub const OPERATION_MODE_PREFIX: &str = "REG_VALUE_OPERATION_MODE_";
pub const POWER_STATUS_PREFIX: &str = "COMP_VALUE_STEP_";

/// Mode labels excluded from the operation-mode map; they collide in
/// value-space with regular modes on some firmware.
const OPERATION_MODE_SKIP_LIST: &[&str] = &["SERVICE"];

/// The vendor's atomic addressable unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    #[serde(default)]
    pub register_id: Option<i64>,
    #[serde(default)]
    pub register_index: Option<i64>,
    pub register_name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub register_value: Option<f64>,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub step: Option<f64>,
    #[serde(default)]
    pub value_names: Vec<RegisterValueName>,
}

impl Register {
    pub fn value_as_int(&self) -> Option<i64> {
        self.register_value.map(|v| v as i64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterValueName {
    pub value: i64,
    pub name: String,
    #[serde(default)]
    pub visible: bool,
}

/// Register group as addressed by the `Groups/{name}` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterGroup {
    Temperatures,
    OperationalStatus,
    OperationalTime,
    OperationalOperation,
    HotWater,
}

impl RegisterGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterGroup::Temperatures => REG_GROUP_TEMPERATURES,
            RegisterGroup::OperationalStatus => REG_GROUP_OPERATIONAL_STATUS,
            RegisterGroup::OperationalTime => REG_GROUP_OPERATIONAL_TIME,
            RegisterGroup::OperationalOperation => REG_GROUP_OPERATIONAL_OPERATION,
            RegisterGroup::HotWater => REG_GROUP_HOT_WATER,
        }
    }
}

/// A hardware-family-specific convention for which register name and
/// value-name prefix encodes the operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDialect {
    pub register_name: &'static str,
    pub value_name_prefix: &'static str,
    /// Offset subtracted before bit-decomposition; nonzero where the
    /// dialect's "off" encoding is not zero.
    pub baseline: i64,
}

/// Probe order is fixed: first register present in the group wins.
pub const STATUS_DIALECTS: &[StatusDialect] = &[
    StatusDialect {
        register_name: REG_OPERATIONAL_STATUS_PRIO1,
        value_name_prefix: "REG_VALUE_STATUS_",
        baseline: 0,
    },
    StatusDialect {
        register_name: COMP_STATUS_ATEC,
        value_name_prefix: "COMP_VALUE_",
        baseline: 0,
    },
    StatusDialect {
        register_name: COMP_STATUS_ITEC,
        value_name_prefix: "COMP_VALUE_",
        baseline: 0,
    },
    StatusDialect {
        register_name: REG_OPERATIONAL_STATUS_PRIORITY_BITMASK,
        value_name_prefix: "REG_VALUE_",
        baseline: 0,
    },
    StatusDialect {
        register_name: COMP_STATUS,
        value_name_prefix: "COMP_VALUE_",
        baseline: 4, // 4 is OFF on Diplomat pumps
    },
];

/// Finds the register with the given name, requiring it to be unique in the
/// group. Zero or multiple matches both count as "not supported".
pub fn find_register<'a>(group: &'a [Register], name: &str) -> Option<&'a Register> {
    let mut matches = group.iter().filter(|r| r.register_name == name);
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

/// Builds a value-to-label map by stripping `prefix` off each value name.
/// Entries whose name does not carry the prefix are skipped; on duplicate
/// values the first entry wins.
pub fn build_value_name_map(
    value_names: &[RegisterValueName],
    prefix: &str,
) -> BTreeMap<i64, String> {
    let mut map = BTreeMap::new();
    for entry in value_names {
        let Some(label) = entry.name.split(prefix).nth(1) else {
            continue;
        };
        map.entry(entry.value).or_insert_with(|| label.to_string());
    }
    map
}

/// Decoded `REG_OPERATIONMODE` state.
#[derive(Debug, Clone)]
pub struct OperationMode {
    pub current: String,
    pub available: BTreeMap<i64, String>,
    pub is_read_only: bool,
    pub register_index: Option<i64>,
}

/// Resolves the operation mode from a register group. Returns `None` when
/// the register is absent, carries no value names, or its current value
/// maps to no known mode.
pub fn resolve_operation_mode(group: &[Register]) -> Option<OperationMode> {
    let data = find_register(group, REG_OPERATIONMODE)?;
    if data.value_names.is_empty() {
        return None;
    }
    let current_value = data.value_as_int()?;

    let mut available = build_value_name_map(&data.value_names, OPERATION_MODE_PREFIX);
    available.retain(|_, name| !OPERATION_MODE_SKIP_LIST.contains(&name.as_str()));

    let current = available.get(&current_value)?.clone();

    Some(OperationMode {
        current,
        available,
        is_read_only: data.is_read_only,
        register_index: data.register_index,
    })
}

/// A resolved binary hot-water switch.
#[derive(Debug, Clone, Copy)]
pub struct HotWaterSwitch {
    pub value: i64,
    pub register_index: Option<i64>,
}

/// A register counts as a switch only if it has a numeric value and exactly
/// two enumerated states.
pub fn resolve_switch(group: &[Register], name: &str) -> Option<HotWaterSwitch> {
    let data = group.iter().find(|r| r.register_name == name)?;
    let value = data.value_as_int()?;
    if data.value_names.len() != 2 {
        return None;
    }
    Some(HotWaterSwitch {
        value,
        register_index: data.register_index,
    })
}

/// Tries the known status dialects in fixed priority order against the
/// operational-status group. The result is cached per device by the caller;
/// the dialect is a hardware-fixed property.
pub fn probe_status_dialect(group: &[Register]) -> Option<&'static StatusDialect> {
    STATUS_DIALECTS
        .iter()
        .find(|dialect| find_register(group, dialect.register_name).is_some())
}

/// Decodes a composite status value against an enumerated flag map.
///
/// An exact match yields that single label. Otherwise, for positive values
/// and more than one candidate flag, the value minus `baseline` is greedily
/// decomposed into flags in descending value order. Only a remainder of
/// exactly zero is accepted; anything else yields no determinable status.
pub fn decode_composite(
    available: &BTreeMap<i64, String>,
    current: i64,
    baseline: i64,
) -> Vec<String> {
    if let Some(label) = available.get(&current) {
        return vec![label.clone()];
    }
    if current <= 0 || available.len() < 2 {
        return Vec::new();
    }

    let mut remainder = current - baseline;
    let mut labels = Vec::new();
    for (value, label) in available.iter().rev() {
        if *value <= remainder {
            remainder -= *value;
            labels.push(label.clone());
        }
    }

    if remainder == 0 { labels } else { Vec::new() }
}

/// Raw register fields for callers addressing registers the interpreter has
/// no special knowledge of.
#[derive(Debug, Clone, Copy)]
pub struct RegisterData {
    pub id: i64,
    pub is_read_only: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub step: Option<f64>,
    pub value: Option<f64>,
}

pub fn register_data_by_name(group: &[Register], name: &str) -> Option<RegisterData> {
    let data = find_register(group, name)?;
    Some(RegisterData {
        id: data.register_id?,
        is_read_only: data.is_read_only,
        min_value: data.min_value,
        max_value: data.max_value,
        step: data.step,
        value: data.register_value,
    })
}
