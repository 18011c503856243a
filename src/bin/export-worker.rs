//! Chatlogger export worker
//!
//! Claims export tasks from the durable queue and generates the
//! artifacts. Runs as a separate process from the API server; any number
//! of workers can drain the same queue.

use std::env;

use anyhow::{Context, Result};
use tracing::info;

use chatlogger::jobs::WorkerPool;
use chatlogger::{db, init_logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("export-worker {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config);

    info!("Export worker starting up");

    let db = db::init_pool(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;

    tokio::fs::create_dir_all(&config.export.export_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create export directory {:?}",
                config.export.export_dir
            )
        })?;

    let pool = WorkerPool::new(db, config);
    let shutdown = pool.shutdown_token();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    pool.run().await;

    info!("Export worker shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, draining workers"),
        _ = terminate => info!("Received SIGTERM, draining workers"),
    }
}

fn print_help() {
    println!("export-worker {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Background worker that processes queued export jobs");
    println!();
    println!("USAGE:");
    println!("    export-worker [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    Reads config.yaml (or CHATLOGGER_CONFIG) with CHATLOGGER_*");
    println!("    environment variable overrides.");
}
