//! amity-sync - people/moment synchronization service
//!
//! Hosts the pairing handshake, identity mapping, and sync push receiver
//! for the Amity relationship tracker. Pairs with a peer deployment over
//! HMAC-signed server-to-server calls.

use amity_common::config::{prepare_database_path, resolve_root_folder, DEFAULT_PORT};
use amity_sync::{build_router, AppState};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "amity-sync", about = "Amity synchronization service")]
struct Args {
    /// Root data folder (overrides AMITY_ROOT and config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP listen port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Base URL peers use to reach this deployment
    #[arg(long, env = "AMITY_BASE_URL", default_value = "http://127.0.0.1:5740")]
    base_url: String,

    /// System name advertised during pairing
    #[arg(long, env = "AMITY_SYSTEM_NAME", default_value = "amity")]
    system_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Amity Sync (amity-sync) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref())?;
    let db_path = prepare_database_path(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = match amity_common::db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool, args.system_name, args.base_url).await;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("amity-sync listening on http://0.0.0.0:{}", args.port);
    info!("Health check: http://127.0.0.1:{}/health", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
