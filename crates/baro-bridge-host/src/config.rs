//! Layered host configuration
//!
//! Values are resolved in this order, later layers winning:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `BARO_BRIDGE_CONFIG`, else `./baro-bridge.toml`)
//! 3. Environment variables (`BARO_BRIDGE_PORT`, `BARO_BRIDGE_BAUD`, `BARO_BRIDGE_ENCODING`)
//! 4. CLI flags
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! timeout_ms = 2000
//!
//! [bridge]
//! encoding = "text"
//! clear_attempts = 3
//!
//! [sensor]
//! oversampling = 0
//! poll_interval_ms = 1000
//! retry_interval_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use baro_bridge_core::sensors::Oversampling;
use baro_bridge_core::{Encoding, MAX_TRANSPORT_TIMEOUT, MonitorSettings};
use log::{debug, info};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_VAR: &str = "BARO_BRIDGE_CONFIG";
pub const PORT_VAR: &str = "BARO_BRIDGE_PORT";
pub const BAUD_VAR: &str = "BARO_BRIDGE_BAUD";
pub const ENCODING_VAR: &str = "BARO_BRIDGE_ENCODING";

/// Looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "baro-bridge.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No serial port configured and {available} ports available; pass --port")]
    NoPort { available: usize },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub bridge: BridgeConfig,
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub encoding: Encoding,
    /// Buffer clears attempted at startup before giving up on an acknowledgement
    pub clear_attempts: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Text,
            clear_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub oversampling: u8,
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            oversampling: 0,
            poll_interval_ms: 1000,
            retry_interval_ms: 1000,
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub encoding: Option<Encoding>,
    pub oversampling: Option<u8>,
}

/// Pick the config file to load.
///
/// An explicit path or `BARO_BRIDGE_CONFIG` must exist; the default file in
/// the working directory is optional.
pub fn find_config_file(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> ConfigResult<Option<PathBuf>> {
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_PATH_VAR).map(PathBuf::from));

    if let Some(path) = requested {
        return if path.exists() {
            Ok(Some(path))
        } else {
            Err(ConfigError::FileNotFound(path))
        };
    }

    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    Ok(fallback.exists().then_some(fallback))
}

impl Config {
    /// Defaults overlaid with the TOML file at `path`, if any.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let Some(path) = path else {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        };

        info!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment overrides read through `env`.
    pub fn apply_environment_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(value) = env(PORT_VAR) {
            self.serial.port = Some(value);
        }
        if let Some(value) = env(BAUD_VAR) {
            self.serial.baud_rate = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: BAUD_VAR, value })?;
        }
        if let Some(value) = env(ENCODING_VAR) {
            self.bridge.encoding = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ENCODING_VAR, value })?;
        }
        Ok(())
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(port) = &cli.port {
            self.serial.port = Some(port.clone());
        }
        if let Some(baud_rate) = cli.baud_rate {
            self.serial.baud_rate = baud_rate;
        }
        if let Some(encoding) = cli.encoding {
            self.bridge.encoding = encoding;
        }
        if let Some(oversampling) = cli.oversampling {
            self.sensor.oversampling = oversampling;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Validation("serial.baud_rate must be non-zero".into()));
        }
        let timeout = self.timeout();
        if timeout.is_zero() || timeout > MAX_TRANSPORT_TIMEOUT {
            return Err(ConfigError::Validation(format!(
                "serial.timeout_ms must be within 1..={}",
                MAX_TRANSPORT_TIMEOUT.as_millis()
            )));
        }
        if Oversampling::try_from(self.sensor.oversampling).is_err() {
            return Err(ConfigError::Validation(format!(
                "sensor.oversampling must be 0..=3, got {}",
                self.sensor.oversampling
            )));
        }
        if self.bridge.clear_attempts == 0 {
            return Err(ConfigError::Validation("bridge.clear_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// The configured port, or the only one available.
    pub fn resolve_port(&self, available: &[String]) -> ConfigResult<String> {
        if let Some(port) = &self.serial.port {
            return Ok(port.clone());
        }
        match available {
            [only] => {
                info!("Using the only available serial port {only}");
                Ok(only.clone())
            }
            _ => Err(ConfigError::NoPort {
                available: available.len(),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.sensor.retry_interval_ms)
    }

    pub fn monitor_settings(&self) -> ConfigResult<MonitorSettings> {
        let oversampling = Oversampling::try_from(self.sensor.oversampling).map_err(|_| {
            ConfigError::InvalidValue {
                key: "sensor.oversampling",
                value: self.sensor.oversampling.to_string(),
            }
        })?;

        Ok(MonitorSettings {
            oversampling,
            poll_interval: Duration::from_millis(self.sensor.poll_interval_ms),
            retry_interval: self.retry_interval(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.bridge.encoding, Encoding::Text);
        assert_eq!(config.bridge.clear_attempts, 3);
        assert_eq!(config.sensor.oversampling, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baro-bridge.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[serial]").unwrap();
        writeln!(file, "port = \"/dev/ttyUSB1\"").unwrap();
        writeln!(file, "[bridge]").unwrap();
        writeln!(file, "encoding = \"binary\"").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.bridge.encoding, Encoding::Binary);
        assert_eq!(config.sensor, SensorConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[bridge]\nencoding = \"morse\"\n").unwrap();

        assert!(matches!(Config::load(Some(path.as_path())), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_find_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        File::create(&path).unwrap();

        assert_eq!(find_config_file(Some(path.as_path()), no_env).unwrap(), Some(path.clone()));

        let env = env_of(&[(CONFIG_PATH_VAR, path.to_str().unwrap())]);
        assert_eq!(find_config_file(None, env).unwrap(), Some(path));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            find_config_file(Some(missing.as_path()), no_env),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = Config::default();
        let env = env_of(&[(PORT_VAR, "COM3"), (BAUD_VAR, "19200"), (ENCODING_VAR, "Binary")]);
        config.apply_environment_overrides(env).unwrap();

        assert_eq!(config.serial.port.as_deref(), Some("COM3"));
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.bridge.encoding, Encoding::Binary);
    }

    #[test]
    fn test_environment_override_rejects_garbage() {
        let mut config = Config::default();
        let env = env_of(&[(BAUD_VAR, "fast")]);

        assert!(matches!(
            config.apply_environment_overrides(env),
            Err(ConfigError::InvalidValue { key: BAUD_VAR, .. })
        ));
    }

    #[test]
    fn test_cli_wins_over_environment() {
        let mut config = Config::default();
        config
            .apply_environment_overrides(env_of(&[(PORT_VAR, "COM3"), (BAUD_VAR, "19200")]))
            .unwrap();
        config.apply_cli_overrides(&CliOverrides {
            port: Some("COM7".into()),
            oversampling: Some(3),
            ..CliOverrides::default()
        });

        assert_eq!(config.serial.port.as_deref(), Some("COM7"));
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.sensor.oversampling, 3);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.serial.timeout_ms = 60_001;
        assert!(config.validate().is_err());

        config.serial.timeout_ms = 60_000;
        assert!(config.validate().is_ok());

        config.sensor.oversampling = 4;
        assert!(config.validate().is_err());

        config.sensor.oversampling = 1;
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_port() {
        let mut config = Config::default();
        let one = vec!["/dev/ttyACM0".to_string()];
        let two = vec!["/dev/ttyACM0".to_string(), "/dev/ttyUSB0".to_string()];

        assert_eq!(config.resolve_port(&one).unwrap(), "/dev/ttyACM0");
        assert!(matches!(
            config.resolve_port(&two),
            Err(ConfigError::NoPort { available: 2 })
        ));
        assert!(matches!(
            config.resolve_port(&[]),
            Err(ConfigError::NoPort { available: 0 })
        ));

        config.serial.port = Some("COM4".into());
        assert_eq!(config.resolve_port(&two).unwrap(), "COM4");
    }

    #[test]
    fn test_monitor_settings() {
        let mut config = Config::default();
        config.sensor.oversampling = 2;
        config.sensor.poll_interval_ms = 250;

        let settings = config.monitor_settings().unwrap();
        assert_eq!(settings.oversampling, Oversampling::HighResolution);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.retry_interval, Duration::from_secs(1));
    }
}
