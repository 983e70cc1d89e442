//! PV inverter telemetry service
//!
//! Polls a SUN2000-class inverter over Modbus TCP, decodes its register map
//! into [`Snapshot`]s, keeps a bounded power history and shows everything
//! on a terminal dashboard.

pub mod core;
pub mod dashboard;
pub mod error;
pub mod runtime;

pub use crate::core::client::{ModbusRegisterClient, RegisterClient};
pub use crate::core::config::PvConfig;
pub use crate::core::snapshot::Snapshot;
pub use error::{DecodeError, PvSrvError, Result, TransportError};
pub use runtime::run_service;
