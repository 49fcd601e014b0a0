//! arXiv Auth API
//!
//! Login service fronting the arXiv Keycloak realm. Hands out the compact
//! session token as a cookie.

mod config;
mod error;
mod extractors;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    arxiv_utils::config::load_env();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        realm = %config.oidc.realm,
        client_id = %config.oidc.client_id,
        "Starting arXiv Auth API"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let app = routes::router(AppState::new(config));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
