//! Acquisition loop
//!
//! One long-lived task that keeps the inverter connected and produces one
//! snapshot per interval:
//!
//! ```text
//! Disconnected --connect ok--> Connected --decode ok--> publish, sleep interval
//!      ^  |                        |
//!      |  +--refused: sleep retry   +--decode failed: record error, close
//!      +-------------------------------+
//! ```
//!
//! Every sleep is split into ticks and the stop token is checked between
//! ticks. The client is always closed on exit.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::export::SnapshotExporter;
use super::reconnect::{ReconnectHelper, ReconnectPolicy, ReconnectStats};
use super::shared::SharedState;
use crate::core::client::RegisterClient;
use crate::core::config::PollingConfig;
use crate::core::decoder;

/// Timing of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub tick: Duration,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for AcquisitionSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            retry_delay: config.retry_delay(),
            tick: config.tick(),
        }
    }
}

/// Outcome of one pass through the state machine
enum Step {
    Continue,
    Stop,
}

pub struct AcquisitionLoop<C: RegisterClient> {
    client: C,
    state: SharedState,
    settings: AcquisitionSettings,
    reconnect: ReconnectHelper,
    exporter: Option<SnapshotExporter>,
    stop: CancellationToken,
}

impl<C: RegisterClient> AcquisitionLoop<C> {
    pub fn new(
        client: C,
        state: SharedState,
        settings: AcquisitionSettings,
        stop: CancellationToken,
    ) -> Self {
        let reconnect = ReconnectHelper::new(ReconnectPolicy {
            retry_delay: settings.retry_delay,
        });
        Self {
            client,
            state,
            settings,
            reconnect,
            exporter: None,
            stop,
        }
    }

    /// Also write every successful snapshot through `exporter`
    pub fn with_exporter(mut self, exporter: Option<SnapshotExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Run until the stop token is cancelled
    ///
    /// Errors never end the loop. Returns the connect statistics.
    pub async fn run(mut self) -> ReconnectStats {
        let endpoint = self.client.endpoint();
        info!(
            "Acquisition started: {} every {:?}",
            endpoint, self.settings.interval
        );

        while !self.stop.is_cancelled() {
            let step = if self.reconnect.is_connected() {
                self.poll_once(&endpoint).await
            } else {
                self.connect_once(&endpoint).await
            };
            if matches!(step, Step::Stop) {
                break;
            }
        }

        self.client.disconnect().await;
        self.reconnect.mark_disconnected();
        self.state.set_link("Stopped", false);
        info!("Acquisition stopped: {}", endpoint);
        self.reconnect.stats().clone()
    }

    async fn connect_once(&mut self, endpoint: &str) -> Step {
        self.state
            .set_link(format!("Connecting to {}...", endpoint), false);
        self.state.record_connect_attempt();

        let stop = self.stop.clone();
        let result = tokio::select! {
            r = self.reconnect.attempt(self.client.connect()) => r,
            _ = stop.cancelled() => return Step::Stop,
        };

        match result {
            Ok(()) => {
                info!("Connected to {}", endpoint);
                self.state.set_link(format!("Connected to {}", endpoint), true);
                Step::Continue
            },
            Err(e) => {
                self.client.disconnect().await;
                self.state.set_link(
                    format!(
                        "{}: {} (retry in {}s)",
                        endpoint,
                        e,
                        self.settings.retry_delay.as_secs()
                    ),
                    false,
                );
                pause(&self.stop, self.settings.tick, self.settings.retry_delay).await
            },
        }
    }

    async fn poll_once(&mut self, endpoint: &str) -> Step {
        let stop = self.stop.clone();
        let result = tokio::select! {
            r = decoder::decode(&mut self.client) => r,
            _ = stop.cancelled() => return Step::Stop,
        };

        match result {
            Ok(snapshot) => {
                info!(
                    "Poll ok: {:.0} W ({}), {:.2} Hz, {}",
                    snapshot.active_power,
                    snapshot.power.source.as_str(),
                    snapshot.grid_frequency,
                    snapshot.status_line()
                );
                if let Some(exporter) = &self.exporter {
                    if let Err(e) = exporter.write(&snapshot).await {
                        warn!("Export to {} failed: {}", exporter.path().display(), e);
                    }
                }
                self.state.publish(snapshot);
                pause(&self.stop, self.settings.tick, self.settings.interval).await
            },
            Err(e) => {
                warn!("Poll failed: {}", e);
                self.state.record_error(e.to_string());
                self.client.disconnect().await;
                self.reconnect.mark_disconnected();
                self.state
                    .set_link(format!("{}: link lost, reconnecting", endpoint), false);
                Step::Continue
            },
        }
    }
}

/// Sleep `total` in tick-sized steps, stopping early on cancellation
async fn pause(stop: &CancellationToken, tick: Duration, total: Duration) -> Step {
    let tick = tick.max(Duration::from_millis(1));
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.is_cancelled() {
            debug!("Stop requested during sleep");
            return Step::Stop;
        }
        let step = remaining.min(tick);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
    if stop.is_cancelled() {
        Step::Stop
    } else {
        Step::Continue
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::client::mock::MockRegisterClient;
    use tracing_test::traced_test;

    fn settings() -> AcquisitionSettings {
        AcquisitionSettings {
            interval: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            tick: Duration::from_secs(1),
        }
    }

    fn inverter() -> MockRegisterClient {
        let mock = MockRegisterClient::new();
        mock.set_i32(32064, 2000)
            .set_i32(32080, 1900)
            .set_u16(32085, 5000)
            .set_u16(32089, 0x0200);
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connects_are_spaced_by_retry_delay() {
        let mock = MockRegisterClient::new();
        mock.fail_connects(u32::MAX);
        let stop = CancellationToken::new();
        mock.cancel_after_connects(4, stop.clone());

        let state = SharedState::new();
        let stats = AcquisitionLoop::new(mock.clone(), state.clone(), settings(), stop)
            .run()
            .await;

        let attempts = mock.connect_attempts();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
        assert_eq!(stats.failed_connects, 4);
        assert_eq!(state.stats().connect_attempts, 4);
        assert_eq!(state.stats().successful_polls, 0);
        assert!(state.history().is_empty());
        assert!(state.snapshot().is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_cadence_after_recovery() {
        let mock = inverter();
        mock.fail_connects(2);
        let stop = CancellationToken::new();
        let state = SharedState::new();

        let handle = tokio::spawn(
            AcquisitionLoop::new(mock.clone(), state.clone(), settings(), stop.clone()).run(),
        );

        // Two refusals (5 s each), then polls at t=10, 20, 30
        tokio::time::sleep(Duration::from_secs(35)).await;
        stop.cancel();
        handle.await.unwrap();

        let view = state.view();
        assert_eq!(mock.connect_attempts().len(), 3);
        assert_eq!(view.stats.successful_polls, 3);
        assert_eq!(view.history.len(), 3);
        assert_eq!(view.snapshot.active_power, 1900.0);
        assert!(!mock.is_connected());
        assert!(!view.link.up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_records_error_and_reconnects() {
        let mock = inverter();
        let stop = CancellationToken::new();
        let state = SharedState::new();

        let handle = tokio::spawn(
            AcquisitionLoop::new(mock.clone(), state.clone(), settings(), stop.clone()).run(),
        );

        // First poll succeeds at t=0, second one fails at t=10
        tokio::time::sleep(Duration::from_secs(5)).await;
        mock.fail_reads(1);
        tokio::time::sleep(Duration::from_millis(5_001)).await;

        let view = state.view();
        assert_eq!(view.stats.failed_polls, 1);
        assert_eq!(view.stats.successful_polls, 2);
        // Reconnected immediately and polled again; the error is cleared
        assert!(view.last_error.is_none());
        assert_eq!(mock.connect_attempts().len(), 2);
        assert!(mock.disconnect_count() >= 1);

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_kept_while_device_unreachable() {
        let mock = inverter();
        let stop = CancellationToken::new();
        let state = SharedState::new();

        let handle = tokio::spawn(
            AcquisitionLoop::new(mock.clone(), state.clone(), settings(), stop.clone()).run(),
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        mock.fail_reads(1);
        mock.fail_connects(u32::MAX);
        tokio::time::sleep(Duration::from_secs(20)).await;

        let view = state.view();
        assert_eq!(view.stats.successful_polls, 1);
        assert!(view.last_error.is_some());
        // Previous snapshot is still shown
        assert_eq!(view.snapshot.active_power, 1900.0);

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_takes_effect_within_one_tick() {
        let mock = inverter();
        let stop = CancellationToken::new();
        let state = SharedState::new();
        let long = AcquisitionSettings {
            interval: Duration::from_secs(3600),
            ..settings()
        };

        let handle = tokio::spawn(AcquisitionLoop::new(mock.clone(), state, long, stop.clone()).run());
        tokio::time::sleep(Duration::from_secs(2)).await;

        let cancelled_at = tokio::time::Instant::now();
        stop.cancel();
        handle.await.unwrap();

        assert!(cancelled_at.elapsed() <= Duration::from_secs(1));
        assert!(!mock.is_connected());
        assert_eq!(mock.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_export_failure_is_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mock = inverter();
        let stop = CancellationToken::new();
        let state = SharedState::new();

        // A directory cannot be replaced by a file
        let exporter = SnapshotExporter::new(dir.path(), false);
        let handle = tokio::spawn(
            AcquisitionLoop::new(mock, state.clone(), settings(), stop.clone())
                .with_exporter(Some(exporter))
                .run(),
        );
        tokio::time::sleep(Duration::from_secs(15)).await;
        stop.cancel();
        handle.await.unwrap();

        assert!(logs_contain("Export to"));
        assert_eq!(state.stats().successful_polls, 2);
        assert!(state.last_error().is_none());
    }
}
