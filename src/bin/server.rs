//! docshare server
//!
//! Serves the HTTP API and runs the background inspection pipeline.
//!
//! # Configuration
//!
//! Read from `~/.config/docshare/config.yaml` (or `--config` /
//! `DOCSHARE_CONFIG`), with `DOCSHARE_*` environment overrides:
//!
//! ```yaml
//! listen_addr: "0.0.0.0:8080"
//! storage: sqlite
//! database_path: /var/lib/docshare/docshare.db
//! jwt_secret: "change-me"
//! token_ttl_hours: 24
//! pipeline:
//!   inspection_workers: 4
//!   persistence_workers: 4
//! linters:
//!   - lang: text
//!     kind: stub
//!   - lang: go
//!     kind: command
//!     program: staticcheck
//!     extension: go
//! ```

use chrono::TimeDelta;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docshare::auth::TokenIssuer;
use docshare::config::{Config, StorageKind};
use docshare::lint::LinterRegistry;
use docshare::pipeline::{inspection_queue, InspectionPipeline};
use docshare::server::{router, AppState};
use docshare::store::{MemoryStore, SqliteStore, Store};

#[derive(Parser)]
#[command(name = "docshare-server")]
#[command(version)]
#[command(about = "docshare HTTP server")]
struct Args {
    /// Path to config file
    #[arg(long, short, env = "DOCSHARE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshare=info,docshare_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args.config)?;
    config.validate()?;

    let store: Arc<dyn Store> = match config.storage {
        StorageKind::Sqlite => {
            tracing::info!("Database: {}", config.database_path.display());
            Arc::new(SqliteStore::open(&config.database_path).await?)
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage, nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = LinterRegistry::from_config(&config.linters);
    tracing::info!("Linters registered for: {:?}", registry.languages());

    let (queue, intake) = inspection_queue(&config.pipeline.to_pipeline_config());
    let tokens = TokenIssuer::new(
        &config.jwt_secret,
        TimeDelta::hours(i64::from(config.token_ttl_hours)),
    );
    let state = AppState::new(store, queue, tokens);
    let pipeline = InspectionPipeline::start(intake, Arc::new(registry), state.documents.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Starting server on {}", config.listen_addr);

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Drain queued inspections even if serving failed.
    pipeline.shutdown().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
