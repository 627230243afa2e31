use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use scim_provisioning::{bootstrap_directory, build_router, AppConfig, AppState};

#[derive(Parser, Debug)]
#[command(name = "scim-provisioning")]
#[command(about = "SCIM 2.0 provisioning endpoint for external identity providers")]
struct Args {
    /// Configuration file path (default: config.yaml)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let mut app_config =
        if args.config == "config.yaml" && !std::path::Path::new("config.yaml").exists() {
            info!("No config.yaml found, using default configuration");
            AppConfig::default_config()
        } else {
            AppConfig::load_from_file(&args.config)
                .map_err(|e| format!("Failed to load configuration: {}", e))?
        };

    if let Some(port) = args.port {
        app_config.server.port = port;
    }
    if let Some(host) = args.host {
        app_config.server.host = host;
    }

    if app_config.bootstrap.tokens.is_empty() {
        tracing::warn!("No SCIM tokens configured; every request will be rejected");
    }

    let directory = bootstrap_directory(&app_config)
        .map_err(|e| format!("Failed to seed directory: {}", e))?;

    let addr: SocketAddr = format!("{}:{}", app_config.server.host, app_config.server.port)
        .parse()
        .map_err(|e| format!("Invalid listen address: {}", e))?;

    let app = build_router(AppState::in_memory(directory, app_config));

    let listener = TcpListener::bind(addr).await?;
    info!("SCIM server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
