use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voyage_api::{app, parse_catalog_seed, AppState, Repositories};
use voyage_store::app_config::Config;
use voyage_store::{DbClient, MemoryStore, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voyage_api=debug,voyage_offer=info,voyage_core=info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Voyage API on port {}", config.server.port);

    let (repos, db) = if config.database.is_in_memory() {
        tracing::warn!("Using the in-memory store; nothing survives a restart");
        let store = Arc::new(MemoryStore::new());
        match &config.database.catalog_seed {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read catalog seed {}", path))?;
                let added = store.seed_catalog(parse_catalog_seed(&raw)?).await?;
                tracing::info!("Seeded {} catalog offers from {}", added, path);
            }
            None => tracing::warn!(
                "In-memory catalog is empty and database.catalog_seed is unset; every fetch will return []"
            ),
        }
        (Repositories::in_memory(store), None)
    } else {
        let db = DbClient::new(&config.database)
            .await
            .context("Failed to connect to Postgres")?;
        if config.database.run_migrations {
            db.migrate().await.context("Failed to run migrations")?;
        }
        (Repositories::postgres(&db), Some(Arc::new(db)))
    };

    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(
            RedisClient::new(url)
                .await
                .context("Failed to create Redis client")?,
        )),
        None => {
            tracing::info!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let app = app(AppState::new(repos, &config, db, redis)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
