use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use notify_hub::auth;
use notify_hub::config::{generate_config_template, Cli, Config};
use notify_hub::routes;
use notify_hub::state::AppState;
use notify_hub::ws::Hub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    // Initialize tracing/logging
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("notify_hub=info,tower_http=info"))
    };
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter()).init();
    }

    tracing::info!("notify-hub v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        outbox_capacity = config.hub.outbox_capacity,
        ping_interval_ms = config.hub.ping_interval_ms,
        read_deadline_ms = config.hub.read_deadline_ms,
        write_deadline_ms = config.hub.write_deadline_ms,
        max_message_size = config.hub.max_message_size,
        "Hub configuration"
    );

    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.jwt_secret);

    // One hub per process, shared by the WebSocket and trigger handlers
    let hub = Hub::new(config.hub.clone());
    let app = routes::build_router(AppState::new(hub.clone(), jwt_secret));

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(hub))
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, after closing every live session so the
/// WebSocket upgrades do not hold the graceful shutdown open.
async fn shutdown_signal(hub: Hub) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    let closed = hub.close_all();
    tracing::info!(closed, "Shutdown requested, closed all connections");
}
