use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use server::{AppState, serve};
use shared::types::hub_config::AppConfig;

/// Real-time order-notification hub for the storefront dashboards.
#[derive(Parser, Debug)]
#[command(name = "beelink-hub")]
struct Args {
    /// Path to the TOML config file. Built-in defaults apply if absent.
    #[arg(long, default_value = "hub.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    let config = if Path::new(&args.config).exists() {
        shared::config::load_config(&args.config)?
    } else {
        info!("Config file {} not found, using defaults", args.config);
        AppConfig::default()
    };

    let addr = config.server.addr();
    let state = AppState::new(config);

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    serve(listener, state).await
}
