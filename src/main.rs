//! herakles-app-metrics
//!
//! Application metrics server with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod collect;
mod commands;
mod config;
mod handlers;
mod probes;
mod state;
mod system;

use axum::{middleware, routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_record, command_render};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use handlers::{health_handler, metrics_handler, root_handler, track_requests};
use state::{build_state, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Builds the HTTP router with request tracking on every route and the fallback.
fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = load_validated_config(&args)?;
        return match command {
            Commands::Render { format, endpoint } => {
                command_render(*format, endpoint.clone(), config).await
            }
            Commands::Record {
                method,
                endpoint,
                status,
                duration_ms,
            } => command_record(method, endpoint, *status, *duration_ms, config),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting herakles-app-metrics");

    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    if !config.dependencies.is_empty() {
        info!(
            "Probing {} configured dependencies on /health and /metrics?format=json",
            config.dependencies.len()
        );
    }

    let state = Arc::new(build_state(config)?);
    info!(
        "Registered {} metric families",
        state.registry.families()?.len()
    );

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-app-metrics listening on http://{}:{}",
        bind_ip_str, port
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("herakles-app-metrics stopped gracefully");
    Ok(())
}
