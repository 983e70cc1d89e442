//! Runtime: acquisition task, shared state and service wiring

pub mod acquisition;
pub mod export;
pub mod history;
pub mod reconnect;
pub mod service;
pub mod shared;

pub use acquisition::{AcquisitionLoop, AcquisitionSettings};
pub use export::SnapshotExporter;
pub use history::{HistorySample, HistoryStore, HISTORY_CAPACITY};
pub use service::run_service;
pub use shared::{LinkStatus, MonitorView, PollStats, SharedState};
