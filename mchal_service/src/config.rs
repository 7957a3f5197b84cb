//! Compile-time device list and board resource plan loading, plus the
//! `Value` <-> config-record conversions used to carry a device list
//! over the bus as the `config/hal` retained message.
//!
//! `ConfigLoader` is carried verbatim in shape from
//! `evo_common::config::ConfigLoader`: a blanket impl over
//! `DeserializeOwned` giving every config struct a `load(path)` method,
//! rather than hand-writing a loader per config type.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mchal_registry::{PinPlan, ResourcePlan};
use mchal_types::value::{Fixed, Value};

/// Failures raised while loading or parsing a TOML configuration file.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file did not exist at the given path.
    #[error("configuration file not found")]
    FileNotFound,
    /// The file existed but failed to parse as TOML matching the target
    /// shape.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
}

/// Blanket-implemented TOML config loading, mirroring
/// `evo_common::config::ConfigLoader`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load and parse `path` as this type.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// One device's configuration record, as it appears in `devices.toml`'s
/// `[[devices]]` array and as the shape carried inside the `config/hal`
/// bus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// The device's stable identity.
    pub id: String,
    /// The builder type string, looked up in the
    /// [`crate::builder::DeviceBuilderRegistry`].
    #[serde(rename = "type")]
    pub device_type: String,
    /// Builder-specific parameters, converted to the device's own param
    /// struct inside its builder.
    #[serde(default)]
    pub params: toml::Table,
}

/// The top-level shape of `devices.toml`: a flat list of device records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Every device to build at startup.
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// One pin entry in `board.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardPinConfig {
    /// The pin number.
    pub number: u32,
    /// `Some((slice, channel))` if PWM-capable.
    #[serde(default)]
    pub pwm_slice: Option<u32>,
    /// PWM channel on `pwm_slice`, if present.
    #[serde(default)]
    pub pwm_channel: Option<u8>,
}

/// The top-level shape of `board.toml`: the static resource plan
/// (Non-goal per spec §1: out of scope beyond a small illustrative map
/// for the example devices — no dynamic board discovery).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardConfig {
    /// Every pin the board exposes.
    #[serde(default)]
    pub pins: Vec<BoardPinConfig>,
    /// Every I2C bus id the board exposes.
    #[serde(default)]
    pub i2c_buses: Vec<u32>,
    /// Every UART port id the board exposes.
    #[serde(default)]
    pub uart_ports: Vec<u32>,
}

impl From<BoardConfig> for ResourcePlan {
    fn from(cfg: BoardConfig) -> Self {
        ResourcePlan {
            pins: cfg
                .pins
                .into_iter()
                .map(|p| PinPlan {
                    number: p.number,
                    pwm: p.pwm_slice.zip(p.pwm_channel),
                })
                .collect(),
            i2c_buses: cfg.i2c_buses,
            uart_ports: cfg.uart_ports,
        }
    }
}

/// Convert a loaded device list into the `Value` payload published
/// retained on `config/hal`.
pub fn device_records_to_value(records: &[DeviceRecord]) -> Value {
    Value::List(records.iter().map(device_record_to_value).collect())
}

fn device_record_to_value(r: &DeviceRecord) -> Value {
    Value::map([
        ("id", Value::Text(r.id.clone())),
        ("type", Value::Text(r.device_type.clone())),
        ("params", toml_table_to_value(&r.params)),
    ])
}

/// Parse a `config/hal` payload back into device records — used when a
/// config update arrives live over the bus rather than from the
/// compile-time file.
pub fn value_to_device_records(value: &Value) -> Result<Vec<DeviceRecord>, String> {
    let Value::List(items) = value else {
        return Err("config/hal payload must be a list".to_string());
    };
    items.iter().map(value_to_device_record).collect()
}

fn value_to_device_record(v: &Value) -> Result<DeviceRecord, String> {
    let id = v
        .field("id")
        .and_then(as_text)
        .ok_or_else(|| "device record missing text 'id'".to_string())?;
    let device_type = v
        .field("type")
        .and_then(as_text)
        .ok_or_else(|| "device record missing text 'type'".to_string())?;
    let params = match v.field("params") {
        Some(p) => value_to_toml_table(p)?,
        None => toml::Table::new(),
    };
    Ok(DeviceRecord {
        id,
        device_type,
        params,
    })
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn toml_table_to_value(t: &toml::Table) -> Value {
    Value::Map(t.iter().map(|(k, v)| (k.clone(), toml_value_to_value(v))).collect())
}

fn toml_value_to_value(v: &toml::Value) -> Value {
    match v {
        toml::Value::String(s) => Value::Text(s.clone()),
        toml::Value::Integer(i) => Value::I64(*i),
        toml::Value::Float(f) => Value::Fixed(Fixed::from_raw((*f * Fixed::SCALE as f64).round() as i32)),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(a) => Value::List(a.iter().map(toml_value_to_value).collect()),
        toml::Value::Table(t) => toml_table_to_value(t),
        toml::Value::Datetime(d) => Value::Text(d.to_string()),
    }
}

fn value_to_toml_table(v: &Value) -> Result<toml::Table, String> {
    match value_to_toml_value(v)? {
        toml::Value::Table(t) => Ok(t),
        _ => Err("expected a table".to_string()),
    }
}

fn value_to_toml_value(v: &Value) -> Result<toml::Value, String> {
    Ok(match v {
        Value::Text(s) => toml::Value::String(s.clone()),
        Value::I64(i) => toml::Value::Integer(*i),
        Value::U64(u) => toml::Value::Integer(*u as i64),
        Value::Fixed(f) => toml::Value::Float(f.raw() as f64 / Fixed::SCALE as f64),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::List(items) => {
            toml::Value::Array(items.iter().map(value_to_toml_value).collect::<Result<Vec<_>, _>>()?)
        }
        Value::Map(m) => {
            let mut table = toml::Table::new();
            for (k, v) in m {
                table.insert(k.clone(), value_to_toml_value(v)?);
            }
            toml::Value::Table(table)
        }
        other => return Err(format!("value {other:?} has no toml representation")),
    })
}
