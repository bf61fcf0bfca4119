//! Binary entrypoint for the chatvc HTTP server.
//!
//! Configuration comes from flags or their environment fallbacks
//! (`CHATVC_DB_PATH`, `CHATVC_PORT`, `CHATVC_BIND`, `CHATVC_IN_MEMORY`);
//! log filtering from `RUST_LOG`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatvc_server::config::ServerConfig;
use chatvc_server::router::build_router;
use chatvc_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!("chatvc server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
