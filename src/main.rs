//! Request guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────────┐
//!                     │                     REQUEST GUARD                      │
//!                     │                                                        │
//!   Client Request    │  ┌──────────┐   ┌────────────┐   ┌──────────┐          │
//!   ──────────────────┼─▶│ request  │──▶│ rate limit │──▶│   CSRF   │──┐       │
//!                     │  │ id/trace │   │  (tiered)  │   │ (double  │  │       │
//!                     │  └──────────┘   └─────┬──────┘   │  submit) │  ▼       │
//!                     │                       │          └────┬─────┘ ┌─────┐  │
//!                     │                       ▼               │       │ app │  │
//!                     │               ┌──────────────┐        │       └─────┘  │
//!                     │               │counter store │        │                │
//!                     │               └──────────────┘        │                │
//!   429 / 403 / 503   │                                       │                │
//!   ◀─────────────────┼───────────────────────────────────────┘                │
//!                     │  ┌──────────────────────────────────────────────────┐  │
//!                     │  │ config · observability · lifecycle · admin       │  │
//!                     │  └──────────────────────────────────────────────────┘  │
//!                     └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_guard::config::{load_config, load_from_env};
use request_guard::lifecycle::{shutdown_signal, Shutdown};
use request_guard::observability::{logging::init_tracing, metrics::init_metrics};
use request_guard::HttpServer;

#[derive(Parser)]
#[command(name = "request-guard")]
#[command(about = "Rate limiting and CSRF protection in front of an Axum API", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override its values.
    #[arg(short, long, env = "GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-guard starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        whitelist = config.rate_limit.whitelist.len(),
        trust_proxy_headers = config.rate_limit.trust_proxy_headers,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!(tasks = shutdown.receiver_count(), "Draining");
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
