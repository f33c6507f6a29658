mod assets;
mod config;
mod game;
mod persistence;

mod transports {
    pub mod https;
    pub mod session;
}

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::assets::FsAssetLoader;
use crate::config::ServerConfig;
use crate::game::SessionRegistry;
use crate::persistence::github::GithubStore;

#[cfg(feature = "jemalloc")]
mod allocator {
    #[cfg(not(target_env = "msvc"))]
    use tikv_jemallocator::Jemalloc;
    #[cfg(not(target_env = "msvc"))]
    #[global_allocator]
    static GLOBAL: Jemalloc = Jemalloc;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {

    // ================
    //      Tracing
    // ================
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("{}=info,tower_http=debug", env!("CARGO_CRATE_NAME")).into()
                })
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config: env vars plus an optional garden layout file
    let config = ServerConfig::from_env()?;
    let garden = Arc::new(config.garden.clone());
    info!(
        collectibles = garden.collectibles.len(),
        actors = garden.actors.len(),
        "Garden layout loaded"
    );

    // Persistence: sessions use the configured backend, the relay route always commits directly
    let client = persistence::http_client()?;
    let store = persistence::build_store(&config, client.clone());
    let relay_store = Arc::new(GithubStore::new(client, config.github.clone()));

    // Session registry for /stats; the simulation itself lives on each session task
    let registry = SessionRegistry::new(config.session_stale_timeout);
    let registry_cleanup = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry.run_cleanup_task(Duration::from_secs(60)).await;
        })
    };

    let state = transports::https::AppState {
        garden,
        store,
        relay_store,
        assets: Arc::new(FsAssetLoader::new(&config.assets_dir)),
        registry,
    };

    // Tokio
    let http = {
        let config = config.clone();
        tokio::spawn(async move { transports::https::serve(&config, state).await })
    };

    // Print
    info!("Veggie Garden v{}", env!("CARGO_PKG_VERSION"));

    tokio::select! {
        result = http => {
            match result {
                Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
                Err(e) => error!(error = %e, "HTTP server task panicked"),
                Ok(Ok(())) => info!("HTTP server stopped"),
            }
        },
        _ = registry_cleanup => {
            error!("Session cleanup task terminated unexpectedly");
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())

}
