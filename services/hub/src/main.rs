use anyhow::Result;
use common::database::{DatabaseConfig, health_check};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hub::{config::ServerConfig, jwt::JwtConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting resource hub");

    let server_config = ServerConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let jwt_config = JwtConfig::from_env()?;

    let bind_addr = server_config.bind_addr.clone();
    let state = hub::build_state(server_config, &db_config, jwt_config).await?;

    // Check database connectivity
    if health_check(&state.db_pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Start the web server
    let app = hub::app(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Resource hub listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Resource hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
