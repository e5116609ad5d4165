//! url-safety-checker — process entry point.
//!
//! Straight-line startup grounded in `examples/original_source/main.go`:
//! load configuration, connect the Prefix Store and Cache, load any
//! blacklist files named on the command line (one task per file,
//! spec.md §5), spawn the Updater, then serve the HTTP surface until a
//! shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use url_safety_checker::api::{build_router, AppState};
use url_safety_checker::blacklist::BlacklistLoader;
use url_safety_checker::cache::Cache;
use url_safety_checker::config::Config;
use url_safety_checker::lookup::LookupPipeline;
use url_safety_checker::safebrowsing::SafeBrowsingClient;
use url_safety_checker::store::pool::{ConnectionPool, DatabaseConfig};
use url_safety_checker::store::PrefixStore;
use url_safety_checker::updater::Updater;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "starting url-safety-checker");

    let db_config = DatabaseConfig {
        url: config.db_url.clone(),
        ..Default::default()
    };
    let pool = ConnectionPool::connect(db_config).await?;
    let store = PrefixStore::new(pool);

    let cache = Cache::connect(&config.redis_url).await?;
    let client = SafeBrowsingClient::new(config.google_api_key.clone());

    let shutdown = CancellationToken::new();

    let updater = Updater::new(client.clone(), store.clone(), cache.clone());
    let updater_shutdown = shutdown.clone();
    let updater_handle = tokio::spawn(async move { updater.run(updater_shutdown).await });

    let blacklist_files: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let loader = BlacklistLoader::new(cache.clone());
    let mut blacklist_handles = Vec::with_capacity(blacklist_files.len());
    for path in blacklist_files {
        let loader = loader.clone();
        blacklist_handles.push(tokio::spawn(async move {
            if let Err(e) = loader.load_file(&path).await {
                tracing::error!(error = %e, file = ?path, "failed to load blacklist file");
            }
        }));
    }

    let pipeline = LookupPipeline::new(cache.clone(), store.clone(), client);
    let state = Arc::new(AppState { pipeline });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
            };
            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install sigterm handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate => {}
            }

            tracing::info!("shutdown signal received, stopping new updater cycles");
            server_shutdown.cancel();
        })
        .await?;

    updater_handle.abort();
    for handle in blacklist_handles {
        let _ = handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}
