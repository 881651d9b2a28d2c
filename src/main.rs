//! Least-connections HTTP router.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!     Client Request     │  ┌─────────┐    ┌──────────┐    ┌─────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│ registry │───▶│ forward │──┼──▶ Backend
//!                        │  │ server  │    │ acquire  │    │         │  │
//!     Client Response    │  └─────────┘    └────▲─────┘    └────┬────┘  │
//!     ◀──────────────────┼──────────────────────┼───── release ─┘       │
//!                        │                      │                       │
//!                        │  ┌─────────┐    ┌────┴──────┐    ┌────────┐  │
//!     Operator ──────────┼─▶│  admin  │    │  health   │───▶│ prober │──┼──▶ GET /health
//!                        │  │   API   │    │ scheduler │    └────────┘  │
//!                        │  └─────────┘    └───────────┘                │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use lb_router::admin::{self, AdminState};
use lb_router::config::{RouterConfig, load_config};
use lb_router::http::HttpServer;
use lb_router::lifecycle::{Shutdown, signals, startup};
use lb_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "lb-router")]
#[command(about = "Least-connections HTTP router with active health checks", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // A missing file means defaults; anything else is fatal.
    let (config, missing) = match load_config(&args.config) {
        Ok(config) => (config, false),
        Err(e) if e.is_not_found() => (RouterConfig::default(), true),
        Err(e) => {
            eprintln!("Invalid configuration {}: {}", args.config.display(), e);
            return Err(e.into());
        }
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lb-router starting");
    if missing {
        tracing::warn!(path = %args.config.display(), "No configuration file found, continuing with defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::forward_signals(shutdown.clone());

    // Listeners subscribe before the initial probe pass, so a signal during it stops them too.
    let proxy_rx = shutdown.subscribe();
    let admin_rx = shutdown.subscribe();

    let registry = startup::seed_registry(&config)?;
    let scheduler = startup::start_health_checks(registry.clone(), &config, &shutdown).await;

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(registry.clone(), &config.admin);
        Some(tokio::spawn(admin::serve(listener, state, admin_rx)))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, registry);
    server.run(listener, proxy_rx).await?;

    if let Some(task) = admin_task {
        if let Ok(Err(e)) = task.await {
            tracing::error!(error = %e, "Admin listener failed");
        }
    }
    if let Some(handle) = scheduler {
        let _ = handle.join().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
