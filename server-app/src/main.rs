// iqserve -- rtl_tcp-compatible sample streaming server.
//
// Shares one SDR receiver with any number of rtl_tcp clients over TCP.
//
// Usage:
//   iqserve --backend simulated
//   iqserve --backend rsp1 --serial 1809XXXX --port 1234
//   iqserve --backend rsp2 --mock --debug
//
// Exit codes:
//   1  unable to start (driver unavailable, bind failure, ...)
//   2  no devices found
//   3  device not found by serial
//   4  device removed while running

use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use iqserve_core::{Error, Tuner};
use iqserve_rsp::{Driver, RspBuilder, RspModel, rsp_one, rsp_two};
use iqserve_server::{DEFAULT_PORT, RadioSession, ServerConfig, StreamServer};
use iqserve_sim::SimTuner;
use iqserve_test_harness::MockDriver;

const EXIT_START_FAILED: u8 = 1;
const EXIT_NO_DEVICES: u8 = 2;
const EXIT_SERIAL_NOT_FOUND: u8 = 3;
const EXIT_DEVICE_REMOVED: u8 = 4;

/// Which receiver backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// RSP One hardware.
    Rsp1,
    /// RSP Two hardware.
    Rsp2,
    /// Simulated receiver (no hardware required).
    Simulated,
}

/// iqserve -- share one SDR receiver with many rtl_tcp clients.
#[derive(Parser)]
#[command(name = "iqserve", version, about)]
struct Cli {
    /// Receiver backend to drive.
    #[arg(long, value_enum, default_value_t = Backend::Simulated)]
    backend: Backend,

    /// Only open the device with this serial number (hardware backends).
    #[arg(long)]
    serial: Option<String>,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Outbound queue depth per client, in sample buffers.
    #[arg(long, default_value_t = 128)]
    queue_capacity: usize,

    /// Use a mock driver for hardware backends.
    /// Useful for verifying CLI parsing and server wiring without a device.
    #[arg(long)]
    mock: bool,

    /// Log at debug verbosity.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the selected backend behind the capability interface.
///
/// The RSP driver bindings ship separately from this repository; without
/// them (and without `--mock`), hardware backends fail startup with a
/// driver-unavailable error.
async fn build_tuner(cli: &Cli) -> Result<Arc<dyn Tuner>, Error> {
    match cli.backend {
        Backend::Simulated => {
            info!("using simulated backend");
            Ok(Arc::new(SimTuner::new()))
        }
        Backend::Rsp1 | Backend::Rsp2 => {
            let model: RspModel = if cli.backend == Backend::Rsp1 {
                rsp_one()
            } else {
                rsp_two()
            };
            let driver: Arc<dyn Driver> = if cli.mock {
                info!(model = model.name, "using mock driver");
                Arc::new(MockDriver::new())
            } else {
                return Err(Error::DriverUnavailable(
                    "no RSP driver bindings in this build; \
                     use --mock or --backend simulated"
                        .into(),
                ));
            };
            let mut builder = RspBuilder::new(model);
            if let Some(serial) = &cli.serial {
                builder = builder.serial(serial);
            }
            let tuner = builder.build_with_driver(driver).await?;
            Ok(Arc::new(tuner))
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let tuner = build_tuner(&cli).await?;
    let session = Arc::new(RadioSession::new(tuner));

    let config = ServerConfig {
        bind_addr: cli.bind,
        port: cli.port,
        queue_capacity: cli.queue_capacity,
    };
    let server = Arc::new(StreamServer::bind(config, session).await?);

    // Ctrl-C requests the same orderly shutdown a fatal event does.
    tokio::spawn({
        let server = Arc::clone(&server);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                server.shutdown();
            }
        }
    });

    server.run().await
}

fn exit_code_for(error: &Error) -> u8 {
    match error {
        Error::NoDevices => EXIT_NO_DEVICES,
        Error::SerialNotFound(_) => EXIT_SERIAL_NOT_FOUND,
        Error::DeviceRemoved => EXIT_DEVICE_REMOVED,
        _ => EXIT_START_FAILED,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
