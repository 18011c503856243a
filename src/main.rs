//! Chatlogger API server
//!
//! Serves the multi-tenant chat-logging API: authentication, ingestion,
//! API key management and export job control. Export processing itself
//! runs in the separate `export-worker` binary.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use chatlogger::{api, db, init_logging, middleware, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("chatlogger-api {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first so logging knows its format
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config);

    info!("Chatlogger API starting up");

    let db = db::init_pool(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to initialize database")?;

    let state = AppState {
        config: config.clone(),
        db,
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Chatlogger API shut down");
    Ok(())
}

/// Create the application router with all routes and middleware
///
/// Authentication is applied per route group, not globally, so public
/// endpoints like `/api/v1/auth/login` stay reachable.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .nest("/api/v1", api::public_routes())
        .nest(
            "/api/v1",
            api::protected_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            )),
        )
        .nest(
            "/api/v1",
            api::ingestion_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::api_key_middleware,
            )),
        )
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

fn print_help() {
    println!("chatlogger-api {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Multi-tenant chat logging API server");
    println!();
    println!("USAGE:");
    println!("    chatlogger-api [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    Reads config.yaml (or CHATLOGGER_CONFIG) with CHATLOGGER_*");
    println!("    environment variable overrides.");
}
