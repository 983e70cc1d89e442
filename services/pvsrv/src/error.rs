//! Error handling for the PV telemetry service
//!
//! Two recoverable families drive the acquisition loop:
//! - [`TransportError`]: the link to the inverter (refused, lost, timeout)
//! - [`DecodeError`]: a poll that could not produce a complete snapshot
//!
//! [`PvSrvError`] is the service-level error returned from startup paths,
//! where configuration problems are fatal.

use errors::{ErrorCategory, VoltageError, VoltageErrorTrait};
use thiserror::Error;
use voltage_modbus::ModbusError;

/// Transport-level failures talking to the device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    #[error("Connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// An established connection dropped
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// No response within the client's timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Read attempted without an open connection
    #[error("Not connected")]
    NotConnected,

    /// Device answered with a Modbus exception; the link is still up
    #[error("Modbus exception {code:#04x}: {message}")]
    Exception { code: u8, message: String },

    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the device rejected the request rather than the link failing
    pub fn is_exception(&self) -> bool {
        matches!(self, TransportError::Exception { .. })
    }
}

impl From<ModbusError> for TransportError {
    fn from(err: ModbusError) -> Self {
        match err {
            ModbusError::Io { .. }
            | ModbusError::Connection { .. }
            | ModbusError::DeviceNotResponding { .. } => {
                TransportError::ConnectionLost(err.to_string())
            },
            ModbusError::Timeout { .. } => TransportError::Timeout(err.to_string()),
            ModbusError::Exception { code, message, .. } => TransportError::Exception {
                code,
                message: message.to_string(),
            },
            other => TransportError::Protocol(format!("Modbus: {}", other)),
        }
    }
}

/// A poll that did not yield a complete snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A register read failed at the transport layer
    #[error("Read at {address} failed: {source}")]
    Transport {
        address: u16,
        #[source]
        source: TransportError,
    },

    /// Device answered with fewer registers than requested
    #[error("Short read at {address}: expected {expected} registers, got {got}")]
    ShortRead {
        address: u16,
        expected: usize,
        got: usize,
    },

    /// Register content that cannot be interpreted
    #[error("Malformed value at {address}: {reason}")]
    Malformed { address: u16, reason: String },
}

impl DecodeError {
    /// Whether the failure came from the link rather than the data
    pub fn is_transport(&self) -> bool {
        matches!(self, DecodeError::Transport { .. })
    }
}

/// Service-level error type
#[derive(Error, Debug)]
pub enum PvSrvError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for the PV service
pub type Result<T> = std::result::Result<T, PvSrvError>;

impl PvSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        PvSrvError::Configuration(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        PvSrvError::Runtime(msg.into())
    }
}

impl From<serde_json::Error> for PvSrvError {
    fn from(err: serde_json::Error) -> Self {
        PvSrvError::Serialization(format!("JSON: {err}"))
    }
}

impl From<figment::Error> for PvSrvError {
    fn from(err: figment::Error) -> Self {
        PvSrvError::Configuration(err.to_string())
    }
}

// ============================================================================
// Conversion from PvSrvError to VoltageError for the binary boundary
// ============================================================================

impl From<PvSrvError> for VoltageError {
    fn from(err: PvSrvError) -> Self {
        match err {
            PvSrvError::Configuration(msg) => VoltageError::Configuration(msg),
            PvSrvError::Transport(TransportError::Timeout(msg)) => VoltageError::Timeout(msg),
            PvSrvError::Transport(e) => VoltageError::Transport(e.to_string()),
            PvSrvError::Decode(e) => VoltageError::Decode(e.to_string()),
            PvSrvError::Io(e) => VoltageError::Io(e),
            PvSrvError::Serialization(msg) => VoltageError::Serialization(msg),
            PvSrvError::Runtime(msg) => VoltageError::Runtime(msg),
        }
    }
}

impl VoltageErrorTrait for PvSrvError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "PVSRV_CONFIG_ERROR",
            Self::Transport(TransportError::Timeout(_)) => "PVSRV_TIMEOUT",
            Self::Transport(_) => "PVSRV_TRANSPORT_ERROR",
            Self::Decode(_) => "PVSRV_DECODE_ERROR",
            Self::Io(_) => "PVSRV_IO_ERROR",
            Self::Serialization(_) => "PVSRV_SERIALIZATION_ERROR",
            Self::Runtime(_) => "PVSRV_RUNTIME_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Transport(TransportError::Timeout(_)) => ErrorCategory::Timeout,
            Self::Transport(TransportError::Protocol(_) | TransportError::Exception { .. }) => {
                ErrorCategory::Protocol
            },
            Self::Transport(_) => ErrorCategory::Connection,
            Self::Decode(e) if e.is_transport() => ErrorCategory::Connection,
            Self::Decode(_) => ErrorCategory::DataCorruption,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Storage,
            Self::Runtime(_) => ErrorCategory::Internal,
        }
    }
}
