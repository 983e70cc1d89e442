//! Service bootstrap and initialization
//!
//! Command-line parsing, configuration layering and logging setup.
//! Uses common bootstrap utilities for shared functionality.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use common::service_bootstrap::ServiceInfo;
use errors::VoltageResult;

use crate::core::config::PvConfig;
use crate::error::Result;

// Re-export common bootstrap functionality
pub use common::bootstrap_args::ServiceArgs;

/// Command-line arguments for pvsrv
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "pvsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "PV inverter telemetry service",
    long_about = None
)]
pub struct Args {
    /// Inverter IP address or host name
    #[arg(long = "ip", visible_alias = "host")]
    pub host: Option<String>,

    /// Modbus TCP port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Modbus unit id
    #[arg(long)]
    pub unit_id: Option<u8>,

    /// Write the latest snapshot as JSON to this file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Poll interval in seconds
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Configuration file (default: config/pvsrv.yaml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Run without the terminal dashboard
    #[arg(long)]
    pub headless: bool,

    /// Include active-power candidate diagnostics in the JSON export
    #[arg(long)]
    pub verbose_export: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

impl Args {
    /// Apply command-line values on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut PvConfig) {
        if let Some(host) = &self.host {
            config.device.host = host.clone();
        }
        if let Some(port) = self.port {
            config.device.port = port;
        }
        if let Some(unit_id) = self.unit_id {
            config.device.unit_id = unit_id;
        }
        if let Some(output) = &self.output {
            config.output.path = Some(output.clone());
        }
        if let Some(interval) = self.interval {
            config.polling.interval_secs = interval;
        }
        if self.headless {
            config.dashboard.enabled = false;
        }
        if self.verbose_export {
            config.output.verbose = true;
        }
        if let Some(dir) = &self.service.log_dir {
            config.logging.dir = dir.clone();
        }
        if let Some(level) = &self.service.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// Load, override and validate the configuration
pub fn load_config(args: &Args) -> Result<PvConfig> {
    let mut config = PvConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Initialize logging for pvsrv
///
/// The console layer is disabled while the dashboard owns the terminal.
pub fn initialize_logging(
    args: &Args,
    service_info: &ServiceInfo,
    config: &PvConfig,
) -> VoltageResult<()> {
    let level = args.service.parse_log_level(&config.logging.level);
    let console = !config.dashboard.enabled;

    common::service_bootstrap::init_logging(
        service_info,
        Some(config.logging.dir.as_str()),
        level,
        console,
    )?;

    info!(
        "Target {}:{} unit {} every {}s",
        config.device.host, config.device.port, config.device.unit_id, config.polling.interval_secs
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "pvsrv",
            "--ip",
            "192.168.0.10",
            "--port",
            "502",
            "--interval",
            "30",
            "--output",
            "/tmp/pv.json",
            "--headless",
            "--verbose-export",
        ])
        .unwrap();

        let mut config = PvConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.device.host, "192.168.0.10");
        assert_eq!(config.device.port, 502);
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.output.path, Some(PathBuf::from("/tmp/pv.json")));
        assert!(!config.dashboard.enabled);
        assert!(config.output.verbose);
    }

    #[test]
    fn test_host_alias_and_defaults() {
        let args = Args::try_parse_from(["pvsrv", "--host", "inverter.local"]).unwrap();
        assert_eq!(args.host.as_deref(), Some("inverter.local"));

        let mut config = PvConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.device.port, 6607);
        assert!(config.dashboard.enabled);
        assert!(config.output.path.is_none());
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let args = Args::try_parse_from(["pvsrv", "--port", "0"]).unwrap();
        let mut config = PvConfig::default();
        args.apply_overrides(&mut config);
        assert!(config.validate().is_err());
    }
}
