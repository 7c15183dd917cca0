//! Slave configuration
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed `MODBUS_SLAVE_` (nested keys split on `__`,
//!    e.g. `MODBUS_SLAVE_TRANSPORT__BIND=0.0.0.0:1502`)
//! 2. Configuration file (TOML, YAML or JSON, chosen by extension)
//! 3. Default values

use std::path::Path;
use std::time::Duration;

use errors::{config_error, ModbusResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MODBUS_SLAVE_";

/// Highest assignable unit id; 248-255 are reserved
pub const MAX_UNIT_ID: u8 = 247;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    /// Unit id this slave answers to (0 = broadcast only)
    pub unit_id: u8,
    /// Enforce LRC/CRC on serial links
    pub check_frame: bool,
    /// Per-read timeout in milliseconds
    pub timeout_ms: u64,
    pub transport: TransportConfig,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            unit_id: 1,
            check_frame: true,
            timeout_ms: 1000,
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Tcp { bind: String },
    Udp { bind: String },
    Rtu(SerialConfig),
    Ascii(SerialConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Tcp {
            bind: "0.0.0.0:502".to_string(),
        }
    }
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Udp { .. } => "udp",
            Self::Rtu(_) => "rtu",
            Self::Ascii(_) => "ascii",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl SlaveConfig {
    /// Load defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> ModbusResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            let extension = path
                .extension()
                .and_then(|s| s.to_str())
                .ok_or_else(|| config_error!("Config file must have an extension"))?;

            figment = match extension {
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "json" => figment.merge(Json::file(path)),
                _ => {
                    return Err(config_error!(
                        "Unsupported config file format: {}",
                        extension
                    ))
                },
            };
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| config_error!("Failed to load configuration: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.unit_id > MAX_UNIT_ID {
            return Err(config_error!(
                "Unit id {} out of range (0-{})",
                self.unit_id,
                MAX_UNIT_ID
            ));
        }
        if self.timeout_ms == 0 {
            return Err(config_error!("Timeout must be greater than 0"));
        }

        match &self.transport {
            TransportConfig::Tcp { bind } | TransportConfig::Udp { bind } => {
                if bind.is_empty() {
                    return Err(config_error!("Bind address cannot be empty"));
                }
            },
            TransportConfig::Rtu(serial) | TransportConfig::Ascii(serial) => {
                serial.validate()?;
            },
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SerialConfig {
    pub fn validate(&self) -> ModbusResult<()> {
        if self.port.is_empty() {
            return Err(config_error!("Serial port cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(config_error!("Baud rate must be greater than 0"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(config_error!("Data bits must be 5-8, got {}", self.data_bits));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(config_error!("Stop bits must be 1 or 2, got {}", self.stop_bits));
        }
        Ok(())
    }
}
