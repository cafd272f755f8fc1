mod app;
mod config;
mod error;
mod middleware;
mod probe_client;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Result;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr();
    // Swap this for a real headless-browser/HTML-parsing renderer in a
    // production deployment; `fetch-core` ships no such backend (spec §1).
    let renderer: Box<dyn fetch_core::renderer::Renderer> = Box::new(fetch_core::renderer::EchoRenderer);
    let state = Arc::new(AppState::new(config, renderer));

    let router = app::build(state);

    tracing::info!(%addr, "fetch-server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
