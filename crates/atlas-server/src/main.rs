mod cli;
mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use atlas_api::state::{AppState, AppStateInner};
use atlas_api::storage::Storage;
use atlas_db::Database;

use crate::cli::{Cli, Commands};
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mushroomatlas=debug,atlas_api=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Backup { dir } => {
            let dir = dir.unwrap_or_else(|| config.backup_dir.clone());
            backup(&config.db_path, &dir)
        }
        Commands::Grant { username, revoke } => grant(&config.db_path, &username, !revoke),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if !config.has_usable_secret() {
        eprintln!("FATAL: ATLAS_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    // Init database and attachment storage
    let db = Database::open(&config.db_path)?;
    let storage = Storage::new(config.attachment_dir.clone()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        storage,
        jwt_secret: config.jwt_secret.clone(),
        token_days: config.token_days,
    });

    let app = atlas_api::routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Mushroomatlas listening on {}", addr);
    info!("Tokens are valid for {} days", config.token_days);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Writes `backup_YYYYMMDD_HHMMSS.json` into `dir`.
fn backup(db_path: &Path, dir: &Path) -> anyhow::Result<()> {
    let db = Database::open(db_path)?;
    let dump = db.dump_json()?;

    std::fs::create_dir_all(dir)?;
    let file_name = format!("backup_{}.json", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(file_name);
    std::fs::write(&path, serde_json::to_string_pretty(&dump)?)?;

    info!("Backup written to {}", path.display());
    println!("{}", path.display());
    Ok(())
}

fn grant(db_path: &Path, username: &str, allowed: bool) -> anyhow::Result<()> {
    let db = Database::open(db_path)?;
    if !db.set_can_add_mushroom(username, allowed)? {
        bail!("No user named '{}'", username);
    }
    if allowed {
        info!("{} may now add mushrooms, families and habitats", username);
    } else {
        info!("{} may no longer add mushrooms, families and habitats", username);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
