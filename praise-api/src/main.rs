//! praise-api - Praise quantification service
//!
//! Serves the period, assignment and quantification API over HTTP. Caller
//! identity is supplied by the authenticating gateway in front of it.

use anyhow::Result;
use clap::Parser;
use praise_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use praise_common::db::init_database;
use praise_common::events::EventLog;
use praise_api::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "praise-api", version, about = "Praise quantification service")]
struct Args {
    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5730
    #[arg(long, env = "PRAISE_BIND")]
    bind: Option<String>,

    /// Path to config.toml
    #[arg(long, env = "PRAISE_CONFIG")]
    config: Option<PathBuf>,

    /// Username granted ADMIN when no admin exists yet
    #[arg(long, env = "PRAISE_BOOTSTRAP_ADMIN")]
    bootstrap_admin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Log version immediately after tracing init, before any database work
    info!("Starting praise-api v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new(config.clone())
        .with_cli_arg(args.root_folder)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool, EventLog::default());

    if let Some(username) = args.bootstrap_admin.as_deref() {
        match state.services.users.bootstrap_admin(username).await? {
            Some(user) => info!("Granted ADMIN to {} ({})", user.username, user.id),
            None => info!("Admin already present, --bootstrap-admin ignored"),
        }
    }

    let app = build_router(state);

    let bind = args.bind.unwrap_or_else(|| config.bind_address());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("praise-api listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
