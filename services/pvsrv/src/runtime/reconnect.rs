//! Reconnection bookkeeping
//!
//! Tracks the link state and connect statistics for the acquisition loop.
//! The inverter is retried forever with a fixed delay; waiting is left to
//! the caller so it can stay interruptible.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Connection state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Reconnection policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after a refused connect before the next attempt
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Reconnection statistics tracking
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconnectStats {
    /// Total connect attempts
    pub total_attempts: u64,
    /// Successful connects
    pub successful_connects: u64,
    /// Refused or failed connects
    pub failed_connects: u64,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Last successful connection time
    pub last_connected: Option<Instant>,
}

/// Connection state machine with statistics
#[derive(Debug, Default)]
pub struct ReconnectHelper {
    policy: ReconnectPolicy,
    state: ConnectionState,
    stats: ReconnectStats,
}

impl ReconnectHelper {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            stats: ReconnectStats::default(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn stats(&self) -> &ReconnectStats {
        &self.stats
    }

    pub fn retry_delay(&self) -> Duration {
        self.policy.retry_delay
    }

    /// Mark the connection as dropped
    pub fn mark_disconnected(&mut self) {
        if self.state == ConnectionState::Connected {
            debug!("Connection marked as disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Run one connect attempt and record its outcome
    pub async fn attempt<Fut>(&mut self, connect: Fut) -> Result<(), TransportError>
    where
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.stats.total_attempts += 1;
        let attempt = self.stats.consecutive_failures + 1;

        match connect.await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Connected after {} attempts", attempt);
                }
                self.state = ConnectionState::Connected;
                self.stats.successful_connects += 1;
                self.stats.consecutive_failures = 0;
                self.stats.last_connected = Some(Instant::now());
                Ok(())
            },
            Err(e) => {
                warn!(
                    "Connection attempt {} failed: {}. Retrying in {:?}",
                    attempt, e, self.policy.retry_delay
                );
                self.state = ConnectionState::Disconnected;
                self.stats.failed_connects += 1;
                self.stats.consecutive_failures += 1;
                Err(e)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_attempts_are_counted() {
        let mut helper = ReconnectHelper::new(ReconnectPolicy::default());
        let refuse = || async { Err(TransportError::NotConnected) };

        assert!(helper.attempt(refuse()).await.is_err());
        assert!(helper.attempt(refuse()).await.is_err());
        assert_eq!(helper.connection_state(), ConnectionState::Disconnected);
        assert_eq!(helper.stats().failed_connects, 2);
        assert_eq!(helper.stats().consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let mut helper = ReconnectHelper::new(ReconnectPolicy {
            retry_delay: Duration::from_millis(10),
        });
        let _ = helper
            .attempt(async { Err(TransportError::Timeout("connect".into())) })
            .await;
        helper.attempt(async { Ok(()) }).await.unwrap();

        assert!(helper.is_connected());
        assert_eq!(helper.stats().total_attempts, 2);
        assert_eq!(helper.stats().successful_connects, 1);
        assert_eq!(helper.stats().consecutive_failures, 0);
        assert!(helper.stats().last_connected.is_some());

        helper.mark_disconnected();
        assert_eq!(helper.connection_state(), ConnectionState::Disconnected);
        assert_eq!(helper.retry_delay(), Duration::from_millis(10));
    }
}
