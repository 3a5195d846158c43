mod api;
mod auth;
mod client;
mod device;
mod error;
mod registers;
mod schedule;
mod types;

pub use client::{ApiType, Thermia, ThermiaBuilder};
pub use device::{HeatPump, HistoricalDataPoint};
pub use error::{Error, Result};
pub use registers::*;
pub use schedule::{
    CAL_FUNCTION_EVU_MODE, CAL_FUNCTION_HOT_WATER_BLOCK, CAL_FUNCTION_REDUCED_HEATING_EFFECT,
    CAL_FUNCTION_SILENT_MODE, CalendarFunction, CalendarFunctionProperties, CalendarSchedule,
    DATETIME_FORMAT,
};
pub use types::*;
