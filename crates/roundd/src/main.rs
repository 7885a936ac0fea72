//! roundd — the roundcast daemon.
//!
//! Single binary that assembles the roundcast subsystems:
//! - Round store (redb)
//! - Per-tenant round schedulers
//! - Startup recovery of rounds interrupted by a restart
//! - REST API + SSE event stream
//!
//! # Usage
//!
//! ```text
//! roundd serve --config /etc/roundcast.toml --port 8080 --data-dir /var/lib/roundcast
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use roundcast_scheduler::{Clock, RoundRegistry, SchedulerSettings};
use tracing::info;

use crate::config::RoundcastConfig;

#[derive(Parser)]
#[command(name = "roundd", about = "roundcast daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the round API.
    Serve {
        /// Path to a TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,roundd=debug,roundcast=debug"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = RoundcastConfig::load(config.as_deref())?
                .apply_env(|key| std::env::var(key).ok());
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            run_serve(config).await
        }
    }
}

async fn run_serve(config: RoundcastConfig) -> anyhow::Result<()> {
    info!(
        start_buffer_ms = config.timing.start_buffer_ms,
        duration_ms = config.timing.duration_ms,
        "roundcast daemon starting"
    );

    // Ensure data directory exists.
    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("roundcast.redb");

    // Round store.
    let store = roundcast_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "round store opened");

    // Schedulers.
    let settings = SchedulerSettings {
        timing: config.timing,
        retry: config.retry.into(),
        clock: Clock::system(),
    };
    let registry =
        RoundRegistry::with_event_capacity(Arc::new(store), settings, config.server.event_capacity);

    // Close out rounds interrupted by the previous shutdown.
    let recovered = registry.recover_all().await?;
    info!(tenants = recovered.len(), "startup recovery finished");

    // ── Start API server ───────────────────────────────────────

    let router = roundcast_api::build_router(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("roundcast daemon stopped");
    Ok(())
}
