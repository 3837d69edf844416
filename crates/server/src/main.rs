//! Updraft API server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use updraft_cache as cache;
use updraft_core::config::AppConfig;
use updraft_metadata::{MetadataStore, PostgresStore};
use updraft_queue::Connection;
use updraft_server::{create_router, AppState};
use updraft_storage::Storage;

/// Updraft - a self-hosted OTA update server
#[derive(Parser, Debug)]
#[command(name = "updraft-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "UPDRAFT_CONFIG",
        default_value = "config/updraft.toml"
    )]
    config: String,
}

/// Environment overrides for the documented variable names.
fn env_provider() -> Env {
    Env::raw()
        .only(&[
            "POSTGRES_DSN",
            "NATS_URL",
            "DEBUG",
            "BIND",
            "STORAGE_LOCAL_PATH",
            "STORAGE_LOCAL_SECRET_KEY_PATH",
            "API_PUBLIC_URL",
            "STORAGE_DRIVER_URL",
            "CACHE_DRIVER",
            "CACHE_REDIS_URL",
        ])
        .map(|key| {
            let name = key.as_str().to_ascii_uppercase();
            match name.as_str() {
                "POSTGRES_DSN" => "postgres.dsn".into(),
                "NATS_URL" => "queue.url".into(),
                "DEBUG" => "server.debug".into(),
                "BIND" => "server.bind".into(),
                "STORAGE_LOCAL_PATH" => "storage.local_path".into(),
                "STORAGE_LOCAL_SECRET_KEY_PATH" => "storage.secret_key_path".into(),
                "API_PUBLIC_URL" => "storage.api_public_url".into(),
                "STORAGE_DRIVER_URL" => "storage.driver_url".into(),
                "CACHE_DRIVER" => "cache.driver".into(),
                "CACHE_REDIS_URL" => "cache.redis_url".into(),
                _ => name.into(),
            }
        })
        .split(".")
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;
    init_tracing(config.server.debug);

    let store: Arc<dyn MetadataStore> = Arc::new(
        PostgresStore::connect(&config.postgres)
            .await
            .context("failed to connect to postgres")?,
    );

    let queue = Connection::connect(&config.queue.url)
        .await
        .context("failed to connect to queue")?;

    let storage = Storage::from_config(&config.storage)
        .await
        .context("failed to init storage")?;

    let cache = cache::from_config(&config.cache)
        .await
        .context("failed to init cache")?;

    let bind = config.server.bind.clone();
    let state = AppState::new(config, store, storage, queue, cache);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "API server started");
    axum::serve(listener, router)
        .await
        .context("server exited with error")?;

    Ok(())
}
