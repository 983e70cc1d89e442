//! Service configuration
//!
//! Layered with figment, lowest priority first:
//! 1. built-in defaults
//! 2. YAML file (`config/pvsrv.yaml` or `--config`)
//! 3. `PVSRV_` environment variables, `__` separating sections
//! 4. command-line overrides, applied by the caller

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PvSrvError, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/pvsrv.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PVSRV_";

/// Inverter connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "10.88.45.1".to_string(),
            port: 6607,
            unit_id: 0,
            timeout_secs: 5,
        }
    }
}

/// Acquisition cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time between successful polls
    pub interval_secs: u64,
    /// Wait after a refused connect
    pub retry_delay_secs: u64,
    /// Sleep granularity; bounds stop latency
    pub tick_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            retry_delay_secs: 5,
            tick_ms: 1000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// JSON snapshot export
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Export file; export disabled when unset
    pub path: Option<PathBuf>,
    /// Include the power-candidate diagnostics
    pub verbose: bool,
}

/// Terminal dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub refresh_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_ms: 500,
        }
    }
}

impl DashboardConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log root, overridden by `VOLTAGE_LOG_DIR`
    pub dir: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            level: "info".to_string(),
        }
    }
}

/// Complete pvsrv configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PvConfig {
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub output: OutputConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

impl PvConfig {
    /// Build the figment for `path` without extracting it
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        Figment::from(Serialized::defaults(PvConfig::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load defaults, file and environment
    ///
    /// A missing file is not an error; an explicitly requested one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(PvSrvError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
        }

        let config: PvConfig = Self::figment(path).extract()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PvSrvError::Serialization(e.to_string()))
    }

    /// Reject settings the acquisition loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(PvSrvError::config("device.host must not be empty"));
        }
        if self.device.port == 0 {
            return Err(PvSrvError::config("device.port must not be 0"));
        }
        if self.device.timeout_secs == 0 {
            return Err(PvSrvError::config("device.timeout_secs must be at least 1"));
        }
        if self.polling.interval_secs == 0 {
            return Err(PvSrvError::config("polling.interval_secs must be at least 1"));
        }
        if self.polling.retry_delay_secs == 0 {
            return Err(PvSrvError::config(
                "polling.retry_delay_secs must be at least 1",
            ));
        }
        if self.polling.tick_ms == 0 {
            return Err(PvSrvError::config("polling.tick_ms must be at least 1"));
        }
        if self.polling.tick() > self.polling.interval() {
            return Err(PvSrvError::config(format!(
                "polling.tick_ms ({}) must not exceed polling.interval_secs ({}s)",
                self.polling.tick_ms, self.polling.interval_secs
            )));
        }
        if self.dashboard.refresh_ms == 0 {
            return Err(PvSrvError::config("dashboard.refresh_ms must be at least 1"));
        }
        if let Some(path) = &self.output.path {
            if path.as_os_str().is_empty() {
                return Err(PvSrvError::config("output.path must not be empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PvConfig::default();
        assert_eq!(config.device.host, "10.88.45.1");
        assert_eq!(config.device.port, 6607);
        assert_eq!(config.polling.interval(), Duration::from_secs(10));
        assert_eq!(config.polling.retry_delay(), Duration::from_secs(5));
        assert!(config.output.path.is_none());
        assert_eq!(config.dashboard.refresh(), Duration::from_millis(500));
        config.validate().unwrap();

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("host: 10.88.45.1"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PvConfig::default();
        config.device.port = 0;
        assert!(config.validate().is_err());

        let mut config = PvConfig::default();
        config.device.host = "  ".into();
        assert!(config.validate().is_err());

        let mut config = PvConfig::default();
        config.polling.interval_secs = 1;
        config.polling.tick_ms = 1500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_ms"));

        let mut config = PvConfig::default();
        config.dashboard.refresh_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "device:\n  host: 192.168.1.50\n  port: 502\npolling:\n  interval_secs: 30\noutput:\n  path: /tmp/pv.json\n  verbose: true"
        )
        .unwrap();

        let config = PvConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.device.host, "192.168.1.50");
        assert_eq!(config.device.port, 502);
        // Untouched keys keep their defaults
        assert_eq!(config.device.unit_id, 0);
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.polling.retry_delay_secs, 5);
        assert_eq!(config.output.path, Some(PathBuf::from("/tmp/pv.json")));
        assert!(config.output.verbose);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("pvsrv.yaml", "device:\n  host: 192.168.1.50\n")?;
            jail.set_env("PVSRV_DEVICE__HOST", "10.0.0.9");
            jail.set_env("PVSRV_POLLING__INTERVAL_SECS", "20");

            let config: PvConfig = PvConfig::figment(Some(Path::new("pvsrv.yaml"))).extract()?;
            assert_eq!(config.device.host, "10.0.0.9");
            assert_eq!(config.polling.interval_secs, 20);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = PvConfig::load(Some(Path::new("/nonexistent/pvsrv.yaml"))).unwrap_err();
        assert!(matches!(err, PvSrvError::Configuration(_)));
    }
}
