//! Daemon Configuration
//!
//! Loaded from an optional TOML file layered with `VEHICLE__*` environment
//! variables (`VEHICLE__VESC__DEVICE=/dev/ttyUSB0`). Every field defaults to
//! the values the car was tuned with.

use companion_link::CompanionConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use sumd_protocol::{ChannelMap, ChannelMapError};
use thiserror::Error;
use tracing::Level;
use vehicle_fsm::LinkTimeouts;
use vehicle_link::{Calibration, LinkError, SerialConfig};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "vehicle.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Calibration(#[from] LinkError),

    #[error("Invalid receiver channel map: {0}")]
    Channels(#[from] ChannelMapError),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Radio receiver link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSection {
    pub device: String,
    pub baud_rate: u32,
    pub channels: ChannelMap,
}

impl Default for ReceiverSection {
    fn default() -> Self {
        Self {
            device: "/dev/ttySC0".to_string(),
            baud_rate: 115_200,
            channels: ChannelMap::default(),
        }
    }
}

impl ReceiverSection {
    pub fn serial(&self) -> SerialConfig {
        SerialConfig::new(&self.device, self.baud_rate)
    }
}

/// Motor controller link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VescSection {
    pub device: String,
    pub baud_rate: u32,
    /// Telemetry request period
    pub poll_interval_ms: u64,
}

impl Default for VescSection {
    fn default() -> Self {
        Self {
            device: "/dev/ttySC1".to_string(),
            baud_rate: 115_200,
            poll_interval_ms: 100,
        }
    }
}

impl VescSection {
    pub fn serial(&self) -> SerialConfig {
        SerialConfig::new(&self.device, self.baud_rate)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Link watchdog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    pub check_interval_ms: u64,
    pub receiver_timeout_ms: u64,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            check_interval_ms: 50,
            receiver_timeout_ms: 50,
        }
    }
}

impl WatchdogSection {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub receiver: ReceiverSection,
    pub vesc: VescSection,
    pub companion: CompanionConfig,
    pub calibration: Calibration,
    pub watchdog: WatchdogSection,
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
    /// Prometheus exporter listen address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            receiver: ReceiverSection::default(),
            vesc: VescSection::default(),
            companion: CompanionConfig::default(),
            calibration: Calibration::default(),
            watchdog: WatchdogSection::default(),
            log_level: "info".to_string(),
            metrics_addr: None,
        }
    }
}

impl VehicleConfig {
    /// Load `path` (if it exists) and the environment, then validate
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("VEHICLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document (no environment overlay)
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, device, baud) in [
            ("receiver.device", &self.receiver.device, self.receiver.baud_rate),
            ("vesc.device", &self.vesc.device, self.vesc.baud_rate),
        ] {
            if device.is_empty() {
                return Err(invalid(field, "empty device path"));
            }
            if baud == 0 {
                return Err(invalid(field, "baud rate must be positive"));
            }
        }
        if self.receiver.device == self.vesc.device {
            return Err(invalid("vesc.device", "same device as the receiver"));
        }

        for (field, value) in [
            ("vesc.poll_interval_ms", self.vesc.poll_interval_ms),
            ("watchdog.check_interval_ms", self.watchdog.check_interval_ms),
            ("watchdog.receiver_timeout_ms", self.watchdog.receiver_timeout_ms),
            ("companion.timeout_ms", self.companion.timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be positive"));
            }
        }

        if self.companion.topic_prefix.is_empty() {
            return Err(invalid("companion.topic_prefix", "must not be empty"));
        }

        self.receiver.channels.validate()?;
        self.calibration.validate()?;
        self.level()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| invalid("log_level", format!("unknown level '{}'", self.log_level)))
    }

    pub fn link_timeouts(&self) -> LinkTimeouts {
        LinkTimeouts {
            receiver: Duration::from_millis(self.watchdog.receiver_timeout_ms),
            companion: self.companion.timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VehicleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vesc.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.link_timeouts(), LinkTimeouts::default());
        assert_eq!(config.level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = VehicleConfig::from_toml(
            r#"
            log_level = "debug"
            metrics_addr = "127.0.0.1:9000"

            [vesc]
            device = "/dev/ttyUSB0"

            [receiver.channels]
            autonomy = 5

            [calibration]
            throttle_max_duty_cycle = 0.15
            "#,
        )
        .unwrap();

        assert_eq!(config.vesc.device, "/dev/ttyUSB0");
        assert_eq!(config.vesc.baud_rate, 115_200);
        assert_eq!(config.receiver.channels.autonomy, 5);
        assert_eq!(config.receiver.channels.throttle, 1);
        assert_eq!(config.calibration.throttle_max_duty_cycle, 0.15);
        assert_eq!(config.calibration.steering_offset, 0.1);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(config.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases = [
            "log_level = \"loud\"",
            "[watchdog]\ncheck_interval_ms = 0",
            "[vesc]\ndevice = \"/dev/ttySC0\"",
            "[receiver.channels]\ngear = 1",
            "[calibration]\nsteering_max_delta = 0.7",
            "[companion]\ntopic_prefix = \"\"",
        ];
        for case in cases {
            assert!(VehicleConfig::from_toml(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = VehicleConfig::load("/nonexistent/vehicle.toml").unwrap();
        assert_eq!(config.receiver.device, "/dev/ttySC0");
    }
}
