// Chit Fund Manager - REST API server

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use chit_fund::api::{build_router, AppState};
use chit_fund::{init_logging, open_database, Settings};

#[derive(Parser, Debug)]
#[command(name = "chit-server", version, about = "REST API for the chit fund dashboard")]
struct Args {
    /// TOML config file
    #[arg(long, env = "CHIT_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the config)
    #[arg(long, env = "CHIT_DB")]
    db: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8001 (overrides the config)
    #[arg(long, env = "CHIT_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        settings.database_path = db;
    }
    if let Some(bind) = args.bind {
        settings.bind_address = bind;
    }
    init_logging(&settings.log_filter);

    let conn = open_database(&settings.database_path)?;
    tracing::info!(path = ?settings.database_path, "database opened");

    let state = AppState::new(conn, settings.business_name.clone());
    let app = build_router(state, &settings);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_address))?;

    tracing::info!(address = %settings.bind_address, "API listening on /api");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
