//! Unified service bootstrap utilities
//!
//! Provides common initialization functionality for all services,
//! including startup banners and logging initialization.

use crate::logging::{self, LogConfig};
use errors::{VoltageError, VoltageResult};
use tracing::info;

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "pvsrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "pvsrv" => {
            r#"
 ██████╗ ██╗   ██╗███████╗██████╗ ██╗   ██╗
 ██╔══██╗██║   ██║██╔════╝██╔══██╗██║   ██║
 ██████╔╝██║   ██║███████╗██████╔╝██║   ██║
 ██╔═══╝ ╚██╗ ██╔╝╚════██║██╔══██╗╚██╗ ██╔╝
 ██║      ╚████╔╝ ███████║██║  ██║ ╚████╔╝
 ╚═╝       ╚═══╝  ╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => {
            r#"
 ██╗   ██╗ ██████╗ ██╗  ████████╗ █████╗  ██████╗ ███████╗
 ██║   ██║██╔═══██╗██║  ╚══██╔══╝██╔══██╗██╔════╝ ██╔════╝
 ██║   ██║██║   ██║██║     ██║   ███████║██║  ███╗█████╗
 ╚██╗ ██╔╝██║   ██║██║     ██║   ██╔══██║██║   ██║██╔══╝
  ╚████╔╝ ╚██████╔╝███████╗██║   ██║  ██║╚██████╔╝███████╗
   ╚═══╝   ╚═════╝ ╚══════╝╚═╝   ╚═╝  ╚═╝ ╚═════╝ ╚══════╝
            "#
        },
    };

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
}

/// Initialize logging for a service
///
/// Log root directory priority:
/// 1. `VOLTAGE_LOG_DIR` environment variable
/// 2. `log_dir` (from configuration / command line)
/// 3. Default "logs"
///
/// `console` must be false while a full-screen dashboard owns the terminal.
pub fn init_logging(
    service: &ServiceInfo,
    log_dir: Option<&str>,
    level: tracing::Level,
    console: bool,
) -> VoltageResult<()> {
    logging::init_log_root(log_dir);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir: logging::get_log_root().join(&service.name),
        level,
        console,
    };

    logging::init_with_config(log_config)
        .map_err(|e| VoltageError::Configuration(format!("Failed to init logging: {}", e)))
}

