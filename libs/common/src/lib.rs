//! `VoltageEMS` basic library for the PV services
//!
//! Provides functions shared by all services, including:
//! - logging initialisation (daily rolling files + console)
//! - graceful shutdown signal handling
//! - common command-line arguments and startup banner

pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use bootstrap_args::ServiceArgs;
pub use logging::LogConfig;
pub use service_bootstrap::ServiceInfo;

// Re-export common dependencies
pub use tokio;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;
