//! State shared between the acquisition loop and the dashboard
//!
//! A single lock guards the snapshot, the history and the status fields.
//! Readers only ever get an owned [`MonitorView`]; the lock is held for
//! the duration of a copy and never across an `.await`.

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use super::history::{HistorySample, HistoryStore};
use crate::core::snapshot::Snapshot;

/// Link status as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub message: String,
    pub up: bool,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            message: "Starting...".to_string(),
            up: false,
        }
    }
}

/// Poll counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollStats {
    pub successful_polls: u64,
    pub failed_polls: u64,
    pub connect_attempts: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    snapshot: Snapshot,
    history: HistoryStore,
    last_error: Option<String>,
    link: LinkStatus,
    stats: PollStats,
}

/// Owned copy of the monitor state
#[derive(Debug, Clone)]
pub struct MonitorView {
    pub snapshot: Snapshot,
    pub history: Vec<HistorySample>,
    pub last_error: Option<String>,
    pub link: LinkStatus,
    pub stats: PollStats,
}

/// Handle to the shared monitor state
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<MonitorState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out everything the dashboard needs
    pub fn view(&self) -> MonitorView {
        let state = self.inner.lock();
        MonitorView {
            snapshot: state.snapshot.clone(),
            history: state.history.snapshot(),
            last_error: state.last_error.clone(),
            link: state.link.clone(),
            stats: state.stats,
        }
    }

    /// Latest snapshot only
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot.clone()
    }

    /// History samples only, oldest first
    pub fn history(&self) -> Vec<HistorySample> {
        self.inner.lock().history.snapshot()
    }

    pub fn stats(&self) -> PollStats {
        self.inner.lock().stats
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Install a new snapshot and its history sample in one step
    ///
    /// Clears the sticky error.
    pub fn publish(&self, snapshot: Snapshot) {
        let timestamp: DateTime<Local> = snapshot.timestamp.unwrap_or_else(Local::now);
        let sample = HistorySample {
            timestamp,
            value: snapshot.active_power,
        };

        let mut state = self.inner.lock();
        state.snapshot = snapshot;
        state.history.append(sample);
        state.last_error = None;
        state.stats.successful_polls += 1;
    }

    /// Record a failed poll, keeping the previous snapshot
    pub fn record_error(&self, error: impl Into<String>) {
        let mut state = self.inner.lock();
        state.last_error = Some(error.into());
        state.stats.failed_polls += 1;
    }

    pub fn record_connect_attempt(&self) {
        self.inner.lock().stats.connect_attempts += 1;
    }

    pub fn set_link(&self, message: impl Into<String>, up: bool) {
        self.inner.lock().link = LinkStatus {
            message: message.into(),
            up,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_view_is_placeholder() {
        let state = SharedState::new();
        let view = state.view();
        assert!(view.snapshot.is_placeholder());
        assert!(view.history.is_empty());
        assert!(view.last_error.is_none());
        assert!(!view.link.up);
    }

    #[test]
    fn test_error_is_sticky_until_next_publish() {
        let state = SharedState::new();
        state.publish(Snapshot {
            timestamp: Some(Local::now()),
            active_power: 1500.0,
            ..Default::default()
        });
        state.record_error("Read at 32080 failed: Timeout");

        let view = state.view();
        // Previous snapshot retained alongside the error
        assert_eq!(view.snapshot.active_power, 1500.0);
        assert_eq!(view.last_error.as_deref(), Some("Read at 32080 failed: Timeout"));
        assert_eq!(view.stats.failed_polls, 1);

        state.publish(Snapshot {
            timestamp: Some(Local::now()),
            active_power: 1600.0,
            ..Default::default()
        });
        let view = state.view();
        assert!(view.last_error.is_none());
        assert_eq!(view.history.len(), 2);
        assert_eq!(view.history[1].value, 1600.0);
        assert_eq!(view.stats.successful_polls, 2);
    }

    #[test]
    fn test_view_is_detached_from_state() {
        let state = SharedState::new();
        let view = state.view();
        state.publish(Snapshot::default());
        state.set_link("Connected to mock", true);

        assert!(view.history.is_empty());
        assert!(state.view().link.up);
        assert_eq!(state.history().len(), 1);
    }
}
