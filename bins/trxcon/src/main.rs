use clap::Parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use trxcon_config::{SharedConfig, toml_config};
use trxcon_core::debug;
use trxcon_entities::MessageRouter;
use trxcon_entities::{l1ctl::L1ctl, l1sched::L1Sched, trx::TrxLink};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// Scheduler, transceiver link and the L1CTL boundary
fn build_stack(cfg: &SharedConfig) -> MessageRouter {
    let mut router = MessageRouter::new(cfg.clone());

    let trx = match TrxLink::open(cfg.clone()) {
        Ok(trx) => trx,
        Err(e) => {
            eprintln!("Couldn't establish UDP connection: {}", e);
            std::process::exit(1);
        }
    };
    router.register_entity(Box::new(trx));
    router.register_entity(Box::new(L1Sched::new(cfg.clone())));
    router.register_entity(Box::new(L1ctl::new(cfg.clone())));

    router
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "GSM MS layer 1 scheduler for SDR transceivers",
    long_about = "Connects to a transceiver over UDP, synchronises to the configured cell and runs the TDMA scheduler"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with transceiver and cell parameters")]
    config: String,
}

fn main() {
    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    {
        let c = cfg.config();
        eprintln!(" -> transceiver at {}:{}", c.trx.remote_host, c.trx.base_port);
        eprintln!(" -> cell band_arfcn={}", c.cell.band_arfcn);
    }

    let mut router = build_stack(&cfg);

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {}", e);
        std::process::exit(1);
    }

    router.run_stack(None, Some(running));
    tracing::info!("trxcon stopped");
}
