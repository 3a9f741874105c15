//! # Chain Node
//!
//! Development node: one chain plugin over the in-memory ledger.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Read `CHAIN_*` options and the data/config directories
//! 3. Configure the chain plugin (maintenance, genesis, ledger)
//! 4. Start it and report node info
//! 5. Run until Ctrl-C or an emergency shutdown request
//!
//! ## Exit Codes
//!
//! `0` clean stop, `1` emergency shutdown on memory exhaustion, `3` after a
//! standalone reversible-store fix, `-1` any other initialization failure.

use std::sync::Arc;

use anyhow::{Context, Result};
use chain_plugin::errors::{EXIT_BAD_ALLOC, EXIT_INIT_FAILURE};
use chain_plugin::{ChainError, ChainOptions, ChainPlugin, EmergencyShutdown, NodeDirs};
use shared_bus::NodeBus;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<ChainError>()
                .map_or(EXIT_INIT_FAILURE, ChainError::exit_code);
            if matches!(e.downcast_ref::<ChainError>(), Some(ChainError::FixedReversibleDb)) {
                info!("{e}");
            } else {
                error!("{e:#}");
            }
            code
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let options = ChainOptions::from_env().context("Failed to read chain options")?;
    let dirs = NodeDirs::from_env();
    info!(data_dir = %dirs.data_dir.display(), config_dir = %dirs.config_dir.display(), "Starting chain node");

    let bus = Arc::new(NodeBus::new());
    let shutdown = EmergencyShutdown::new();
    let mut plugin = ChainPlugin::new(Arc::clone(&bus));

    plugin
        .configure(&options, &dirs)
        .context("Failed to configure chain plugin")?;
    plugin.start().context("Failed to start chain plugin")?;

    let info = plugin.read_only_api()?.get_info()?;
    info!(
        server_version = %info.server_version,
        head = info.head_block_num,
        lib = info.last_irreversible_block_num,
        head_id = %info.head_block_id,
        "Node ready"
    );
    // Kept alive so the RPC layer can be attached to it.
    let _read_write = plugin.read_write_api(shutdown.clone())?;

    let mut requested = shutdown.subscribe();
    let code = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
            0
        }
        _ = requested.changed() => {
            error!(reason = ?shutdown.reason(), "Stopping after emergency shutdown request");
            EXIT_BAD_ALLOC
        }
    };

    plugin.stop();
    Ok(code)
}
