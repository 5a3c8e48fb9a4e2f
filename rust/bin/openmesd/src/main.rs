//! `openmesd`: the OpenMES server binary.
//!
//! Usage:
//!   openmesd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/openmes/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use openmes_core::Module;
use tracing::info;

use config::ServerConfig;

/// OpenMES server.
#[derive(Parser, Debug)]
#[command(name = "openmesd", about = "OpenMES manufacturing execution server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides `[server] listen`).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let listen = cli
        .listen
        .clone()
        .unwrap_or_else(|| server_config.server.listen.clone());

    // Initialize storage.
    let core_config = server_config.service_config(&listen);
    if let Some(ref dir) = core_config.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let sqlite_path = core_config.resolve_sqlite_path();
    let sql: Arc<dyn openmes_sql::SQLStore> = Arc::new(
        openmes_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    info!("SQL store opened at {}", sqlite_path.display());

    // Modules.
    let hooks = bootstrap::order_hooks(&server_config.mrp);
    info!("MRP order hooks: {}", hooks.len());
    let mrp_service = mrp::service::MrpService::with_hooks(Arc::clone(&sql), hooks)
        .map_err(|e| anyhow::anyhow!("failed to initialize MRP module: {}", e))?;
    let mrp_module = mrp::MrpModule::new(mrp_service);
    info!("MRP module initialized");

    let module_routes = vec![(mrp_module.name(), mrp_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("OpenMES server listening on {}", listen);
    axum::serve(listener, app).await?;

    Ok(())
}
