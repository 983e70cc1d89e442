//! Unified error handling for VoltageEMS PV services
//!
//! Services keep their own domain error types (e.g. `PvSrvError`) and convert
//! into [`VoltageError`] at the service boundary. [`VoltageErrorTrait`] gives
//! every error a stable code, a category and a log level.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorInfo - serialisable error summary
// ============================================================================

/// Error summary suitable for status files and log records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `TRANSPORT_ERROR`)
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Whether the operation may succeed if retried
    pub retryable: bool,
}

// ============================================================================
// VoltageError - Main error type
// ============================================================================

/// Main error type for VoltageEMS PV services
#[derive(Debug, Error)]
pub enum VoltageError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Device Communication Errors
    // ======================================
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VoltageError
pub type VoltageResult<T> = Result<T, VoltageError>;

impl VoltageError {
    /// Convert to an [`ErrorInfo`] summary
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.error_code().to_string(),
            message: self.to_string(),
            retryable: VoltageErrorTrait::is_retryable(self),
        }
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for VoltageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for VoltageError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(format!("YAML: {}", err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::VoltageError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::VoltageError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! invalid_config {
    ($field:expr, $reason:expr) => {
        $crate::VoltageError::InvalidConfig {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}

// ============================================================================
// VoltageError implements VoltageErrorTrait
// ============================================================================

impl VoltageErrorTrait for VoltageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Runtime(_) => "RUNTIME_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Transport(_) => ErrorCategory::Connection,
            Self::Decode(_) => ErrorCategory::DataCorruption,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Storage,
            Self::Runtime(_) | Self::Internal(_) => ErrorCategory::Internal,
            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Error categories and the shared error capability trait
// ============================================================================

/// Error category used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    // Startup
    Configuration,

    // Device link
    Connection,
    Timeout,
    Protocol,

    // Register content
    DataCorruption,

    // Local persistence (export files, logs)
    Storage,

    // System level
    Internal,

    // Others
    Unknown,
}

/// VoltageEMS error capability trait
///
/// Each service keeps its own domain-specific error type and gains the
/// common interface by implementing this trait.
pub trait VoltageErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and export files)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error is retryable (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection
                | ErrorCategory::Timeout
                | ErrorCategory::Protocol
                | ErrorCategory::DataCorruption
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Configuration => Level::ERROR,
            ErrorCategory::Connection
            | ErrorCategory::Timeout
            | ErrorCategory::Protocol
            | ErrorCategory::DataCorruption
            | ErrorCategory::Storage => Level::WARN,
            ErrorCategory::Unknown => Level::WARN,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            VoltageError::Transport("refused".into()).error_code(),
            "TRANSPORT_ERROR"
        );
        assert_eq!(
            invalid_config!("device.port", "must be non-zero").error_code(),
            "INVALID_CONFIG"
        );
        assert_eq!(config_error!("bad {}", 1).error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_error_retryable() {
        assert!(VoltageError::Transport("lost".into()).is_retryable());
        assert!(VoltageError::Decode("short read".into()).is_retryable());
        assert!(VoltageError::Timeout("10.0.0.1:502".into()).is_retryable());
        assert!(!VoltageError::Configuration("x".into()).is_retryable());
        assert!(!VoltageError::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_error_info() {
        let error = VoltageError::InvalidConfig {
            field: "polling.interval_secs".into(),
            reason: "must be at least 1".into(),
        };
        let info = error.to_error_info();
        assert_eq!(info.code, "INVALID_CONFIG");
        assert!(info.message.contains("polling.interval_secs"));
        assert!(!info.retryable);
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(
            VoltageError::Configuration("x".into()).log_level(),
            tracing::Level::ERROR
        );
        assert_eq!(
            VoltageError::Transport("x".into()).log_level(),
            tracing::Level::WARN
        );
    }
}
