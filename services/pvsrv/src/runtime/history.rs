//! Bounded power history

use std::collections::VecDeque;

use chrono::{DateTime, Local};

/// Maximum retained samples
pub const HISTORY_CAPACITY: usize = 144;

/// One output-power reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub timestamp: DateTime<Local>,
    pub value: f64,
}

/// Fixed-capacity FIFO of samples in append order
#[derive(Debug, Clone)]
pub struct HistoryStore {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `capacity` samples (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest sample when full
    ///
    /// Timestamps never go backwards: a sample older than the newest one
    /// (wall clock stepped back) is stored at the newest timestamp.
    pub fn append(&mut self, mut sample: HistorySample) {
        if let Some(last) = self.samples.back() {
            sample.timestamp = sample.timestamp.max(last.timestamp);
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Owned copy of the samples, oldest first
    pub fn snapshot(&self) -> Vec<HistorySample> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
