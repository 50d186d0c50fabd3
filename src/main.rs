// teachshare server

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use teachshare::{app_state::AppState, config::Config, http::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = config.server_address().parse()?;

    // Initialize application state
    let app_state = AppState::new(config).await?;

    let app = create_router(app_state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    tracing::info!("teachshare server starting on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
