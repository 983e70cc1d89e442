//! Common command-line arguments for all VoltageEMS services
//!
//! Provides a unified argument structure that services flatten into their own
//! `Args` type.

#[cfg(feature = "cli")]
use clap::Args;

/// Common service startup arguments
///
/// These arguments are shared by all services and provide standard options
/// for logging and validation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Args))]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error); falls back to the
    /// service configuration when unset
    #[cfg_attr(feature = "cli", arg(short = 'l', long, env = "RUST_LOG"))]
    pub log_level: Option<String>,

    /// Log directory override
    #[cfg_attr(feature = "cli", arg(long, env = "VOLTAGE_LOG_DIR"))]
    pub log_dir: Option<String>,

    /// Disable colored output and the startup banner
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", arg(long))]
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: None,
            log_dir: None,
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Effective log level string, preferring the command line
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        self.log_level.as_deref().unwrap_or(configured)
    }

    /// Parse log level string to tracing::Level
    ///
    /// `configured` is used when no level was given on the command line.
    pub fn parse_log_level(&self, configured: &str) -> tracing::Level {
        match self.effective_log_level(configured).to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}
