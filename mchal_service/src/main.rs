//! # mchald
//!
//! The HAL service binary: loads the board resource plan and compile-time
//! device list, builds the resource registry and built-in device
//! builders, then runs the HAL event loop until a shutdown signal arrives.
//!
//! Grounded directly on `evo_hal::main`'s `Args`/`setup_tracing` shape;
//! the `--simulate`/`--driver` flags have no counterpart here (this
//! binary has no driver-selection concept — every configured device is
//! built), and the RT-loop run/shutdown calls are replaced with an async
//! `HalService::run` under a `#[tokio::main]` runtime.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use mchal_bus::Bus;
use mchal_registry::Registry;
use mchal_ring::RingTable;
use mchal_types::consts::{
    DEFAULT_BOARD_CONFIG_PATH, DEFAULT_DEVICES_CONFIG_PATH, DEFAULT_MULTI_WILDCARD, DEFAULT_SINGLE_WILDCARD,
    DEFAULT_SUBSCRIPTION_QUEUE_SIZE,
};

use mchal_service::config::{BoardConfig, ConfigLoader, DevicesConfig};
use mchal_service::{register_builtin_devices, DeviceBuilderRegistry, HalService};

/// mchald - message-driven HAL service
#[derive(Parser, Debug)]
#[command(name = "mchald")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Message-driven hardware abstraction layer core")]
#[command(long_about = None)]
struct Args {
    /// Path to the compile-time device list (devices.toml).
    #[arg(short, long, default_value = DEFAULT_DEVICES_CONFIG_PATH)]
    config: PathBuf,

    /// Path to the board's pin/bus resource plan (board.toml).
    #[arg(short, long, default_value = DEFAULT_BOARD_CONFIG_PATH)]
    board: PathBuf,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        error!("HAL service startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("mchald v{} starting...", env!("CARGO_PKG_VERSION"));

    let board_config = BoardConfig::load(&args.board).unwrap_or_else(|e| {
        info!(error = %e, path = %args.board.display(), "no board configuration found, using an empty resource plan");
        BoardConfig::default()
    });
    let devices_config = DevicesConfig::load(&args.config).unwrap_or_else(|e| {
        info!(error = %e, path = %args.config.display(), "no device list found, starting with none configured");
        DevicesConfig::default()
    });

    let registry = Arc::new(Registry::new(board_config.into()));
    let ring_table = Arc::new(RingTable::new());

    let mut builders = DeviceBuilderRegistry::new();
    register_builtin_devices(&mut builders);

    let bus = Bus::new(DEFAULT_SUBSCRIPTION_QUEUE_SIZE, DEFAULT_SINGLE_WILDCARD, DEFAULT_MULTI_WILDCARD)?;
    let conn = bus.new_connection("hal");

    let (service, telemetry_rx) = HalService::new(conn, registry, ring_table, builders);
    service.publish_initial_devices(&devices_config.devices);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut shutdown_tx = Some(shutdown_tx);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        if let Some(tx) = shutdown_tx.take() {
            let _ = tx.send(());
        }
    })?;

    service.run(telemetry_rx, shutdown_rx).await;

    info!("mchald shutdown complete");
    Ok(())
}
