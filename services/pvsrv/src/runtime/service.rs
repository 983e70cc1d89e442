//! Service wiring
//!
//! Builds the client and shared state from configuration, starts the
//! acquisition task and the signal listener, runs the dashboard (or waits
//! headless), and joins every task before returning.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::acquisition::{AcquisitionLoop, AcquisitionSettings};
use super::export::SnapshotExporter;
use super::shared::SharedState;
use crate::core::client::ModbusRegisterClient;
use crate::core::config::PvConfig;
use crate::dashboard;
use crate::error::{PvSrvError, Result};

/// Run until the user quits the dashboard or a shutdown signal arrives
pub async fn run_service(config: PvConfig) -> Result<()> {
    let device = &config.device;
    let client = ModbusRegisterClient::new(
        &device.host,
        device.port,
        device.unit_id,
        Duration::from_secs(device.timeout_secs),
    );
    let exporter = config
        .output
        .path
        .as_ref()
        .map(|path| SnapshotExporter::new(path, config.output.verbose));
    if let Some(exporter) = &exporter {
        info!("Exporting snapshots to {}", exporter.path().display());
    }

    let state = SharedState::new();
    let stop = CancellationToken::new();

    let acquisition = tokio::spawn(
        AcquisitionLoop::new(
            client,
            state.clone(),
            AcquisitionSettings::from(&config.polling),
            stop.clone(),
        )
        .with_exporter(exporter)
        .run(),
    );
    let signals = common::shutdown::cancel_on_shutdown(stop.clone());

    let dashboard_result = if config.dashboard.enabled {
        let refresh = config.dashboard.refresh();
        let ui_state = state.clone();
        let ui_stop = stop.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            dashboard::run_dashboard(ui_state, ui_stop, refresh)
        })
        .await;
        // Whatever ended the dashboard ends the service
        stop.cancel();
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PvSrvError::runtime(format!("Dashboard failed: {:#}", e))),
            Err(e) => Err(PvSrvError::runtime(format!("Dashboard task failed: {}", e))),
        }
    } else {
        info!("Running headless; press Ctrl+C to stop");
        stop.cancelled().await;
        Ok(())
    };

    match acquisition.await {
        Ok(stats) => info!(
            "Acquisition finished: {} connects ({} failed)",
            stats.total_attempts, stats.failed_connects
        ),
        Err(e) => error!("Acquisition task failed: {}", e),
    }
    if let Err(e) = signals.await {
        error!("Signal listener failed: {}", e);
    }

    let stats = state.stats();
    info!(
        "Service stopped: {} polls ok, {} failed",
        stats.successful_polls, stats.failed_polls
    );
    dashboard_result
}
