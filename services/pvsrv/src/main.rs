//! PV inverter telemetry service (`pvsrv`)

use clap::Parser;
use tracing::{error, info};

use common::service_bootstrap::ServiceInfo;
use errors::{VoltageError, VoltageResult};
use pvsrv::core::bootstrap::{self, Args};

#[tokio::main]
async fn main() -> VoltageResult<()> {
    let args = Args::parse();

    let service_info = ServiceInfo::new(
        "pvsrv",
        env!("CARGO_PKG_VERSION"),
        "PV Inverter Telemetry Service - Modbus TCP",
    );

    let config = bootstrap::load_config(&args).map_err(VoltageError::from)?;

    if args.service.validate {
        println!("Configuration OK");
        println!("{}", config.to_yaml().map_err(VoltageError::from)?);
        return Ok(());
    }

    bootstrap::initialize_logging(&args, &service_info, &config)?;
    if !args.service.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    if let Err(e) = pvsrv::run_service(config).await {
        let err = VoltageError::from(e);
        let info = err.to_error_info();
        error!("pvsrv failed [{}]: {}", info.code, info.message);
        return Err(err);
    }

    info!("pvsrv exited cleanly");
    Ok(())
}
