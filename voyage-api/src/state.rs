use anyhow::Context;
use std::sync::Arc;
use voyage_catalog::CatalogOffer;
use voyage_core::repository::{EventRepository, OfferSetRepository, UserRepository};
use voyage_offer::{EngineMetrics, EventRecorder, Materializer, OfferRetrieval, Paginator};
use voyage_store::app_config::{Config, RateLimitConfig};
use voyage_store::{DbClient, MemoryStore, PgEventRepository, PgOfferSetRepository, RedisClient};

/// Storage backends the engine runs on.
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub offers: Arc<dyn OfferSetRepository>,
}

impl Repositories {
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            events: store.clone(),
            offers: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        let events = Arc::new(PgEventRepository::new(db.pool.clone()));
        Self {
            users: events.clone(),
            events,
            offers: Arc::new(PgOfferSetRepository::new(db.pool.clone())),
        }
    }
}

/// Reads a JSON array of catalog rows for the in-memory store.
pub fn parse_catalog_seed(raw: &str) -> anyhow::Result<Vec<CatalogOffer>> {
    serde_json::from_str(raw).context("Catalog seed must be a JSON array of catalog offers")
}

#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<EventRecorder>,
    pub retrieval: Arc<OfferRetrieval>,
    pub metrics: EngineMetrics,
    pub db: Option<Arc<DbClient>>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        config: &Config,
        db: Option<Arc<DbClient>>,
        redis: Option<Arc<RedisClient>>,
    ) -> anyhow::Result<Self> {
        let metrics = EngineMetrics::new()?;
        let retry = config.store.retry_policy();

        let recorder = EventRecorder::new(repos.users, repos.events.clone(), retry, metrics.clone());
        let materializer = Materializer::new(
            repos.offers.clone(),
            retry,
            config.materialization.candidate_limit,
            metrics.clone(),
        );
        let paginator = Paginator::new(repos.offers, retry, metrics.clone());
        let retrieval = OfferRetrieval::new(repos.events, retry, materializer, paginator);

        Ok(Self {
            recorder: Arc::new(recorder),
            retrieval: Arc::new(retrieval),
            metrics,
            db,
            redis,
            rate_limit: config.rate_limit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalog_seed_parses() {
        let offers = parse_catalog_seed(include_str!("../../config/catalog.sample.json")).unwrap();
        assert_eq!(offers.len(), 3);
        assert!(offers.iter().all(|o| o.validate().is_ok()));
        assert_eq!(offers[1].country, "Egypt");
    }

    #[test]
    fn test_seed_must_be_an_array_of_offers() {
        assert!(parse_catalog_seed(r#"{"row_id": 1}"#).is_err());
        assert!(parse_catalog_seed(r#"[{"row_id": 1}]"#).is_err());
        assert!(parse_catalog_seed("[]").unwrap().is_empty());
    }
}
