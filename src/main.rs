use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use remedia::persist::Persistor;
use remedia::server;
use remedia::settings::Settings;
use remedia::sync::Tracker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load()?;
    info!(database = %settings.database, mode = ?settings.sync_mode, "starting tracker");

    let store = Persistor::new(settings.persistence_mode())?;
    let tracker = Arc::new(Tracker::new(
        Box::new(store),
        settings.sync_mode,
        settings.exit_level_policy,
    )?);

    let app = server::router(tracker);
    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(listen = %settings.listen, "serving roster collaborator API");
    axum::serve(listener, app).await?;
    Ok(())
}
