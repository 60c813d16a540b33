use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dispatch_core::catalog::Catalog;
use dispatch_core::state::DispatchState;
use dispatch_realtime::adapters::{DirectorySink, NoopDirectory, NoopStore, TripStore};
use dispatch_realtime::hub::{Hub, HubAdapters};

use dispatch_gateway::config::GatewayConfig;
use dispatch_gateway::directory::HttpDirectory;
use dispatch_gateway::push::ExpoPush;
use dispatch_gateway::routes;
use dispatch_gateway::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::parse();

    let store: Box<dyn TripStore> = match &config.database_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => {
                info!(%path, "trip store enabled");
                Box::new(store)
            }
            Err(err) => {
                warn!(%path, %err, "trip store disabled");
                Box::new(NoopStore)
            }
        },
        None => Box::new(NoopStore),
    };
    let directory: Box<dyn DirectorySink> = match &config.directory_url {
        Some(base) => Box::new(HttpDirectory::new(base)),
        None => Box::new(NoopDirectory),
    };
    let adapters = HubAdapters {
        push: Box::new(ExpoPush::new(&config.push_endpoint)),
        store,
        directory,
    };

    let hub = Hub::new(DispatchState::new(Catalog::metro_default()), adapters);
    let app = routes::router(hub);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "dispatch gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
