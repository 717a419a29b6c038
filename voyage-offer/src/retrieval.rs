use std::sync::Arc;
use serde::Deserialize;
use tracing::{info, warn};
use voyage_core::repository::EventRepository;
use voyage_core::{merge_raw, CoreError, CoreResult, FilterSpec, RetryPolicy};
use voyage_shared::ParamFragment;
use crate::materializer::Materializer;
use crate::paginator::{Page, Paginator};

/// Body of a materialize-and-fetch call.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub user_id: i64,
    /// Applied on top of the logged fragments as the most recent one.
    #[serde(default)]
    pub params: Option<ParamFragment>,
    pub offset: i64,
    pub number: i64,
}

/// Ties the event log, materializer and paginator together.
///
/// A request at offset 0 starts a new result set: the filter is merged from
/// the log since the last reset and the user's set is rebuilt before the
/// first page is read. Any other offset only pages the existing set.
pub struct OfferRetrieval {
    events: Arc<dyn EventRepository>,
    retry: RetryPolicy,
    materializer: Materializer,
    paginator: Paginator,
}

impl OfferRetrieval {
    pub fn new(
        events: Arc<dyn EventRepository>,
        retry: RetryPolicy,
        materializer: Materializer,
        paginator: Paginator,
    ) -> Self {
        Self {
            events,
            retry,
            materializer,
            paginator,
        }
    }

    pub async fn fetch(&self, request: &FetchRequest) -> CoreResult<Page> {
        self.paginator.check(request.offset, request.number)?;

        if request.offset == 0 {
            let spec = self
                .resolve_filter(request.user_id, request.params.as_ref())
                .await?;
            let count = self.materializer.materialize(request.user_id, &spec).await?;
            if count == 0 {
                info!("No offers match the filter of user {}", request.user_id);
            }
        }

        self.paginator
            .page(request.user_id, request.offset, request.number)
            .await
    }

    /// Merges the fragments logged since the user's last reset, then `overlay`.
    pub async fn resolve_filter(
        &self,
        user_id: i64,
        overlay: Option<&ParamFragment>,
    ) -> CoreResult<FilterSpec> {
        let mut fragments = self
            .retry
            .run("read_since_last_reset", || {
                self.events.read_since_last_reset(user_id)
            })
            .await?;
        if let Some(overlay) = overlay {
            fragments.push(overlay.clone());
        }

        merge_raw(&fragments).map_err(|e| {
            if let CoreError::IncompleteSpecification { missing } = &e {
                warn!("User {} requested offers without {}", user_id, missing.join(", "));
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EngineMetrics;
    use crate::recorder::EventRecorder;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use voyage_catalog::{CatalogOffer, CatalogQuery, MaterializedOffer};
    use voyage_core::repository::OfferSetRepository;
    use voyage_shared::{ChatUser, NewUserEvent};
    use voyage_store::MemoryStore;

    const USER: i64 = 42;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            call_timeout: Duration::from_secs(1),
        }
    }

    fn fragment(value: Value) -> ParamFragment {
        value.as_object().cloned().unwrap()
    }

    fn offer(row_id: i64, country: &str, price: f64, num_nights: i32, day: u32) -> CatalogOffer {
        let start = NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        CatalogOffer {
            row_id,
            offer_id: format!("hash-{}", row_id),
            start_date: start,
            end_date: start + chrono::Days::new(num_nights as u64),
            title: format!("Resort {}", row_id),
            country: country.to_string(),
            city: Some("Antalya".to_string()),
            num_nights,
            num_stars: 4,
            mealplan: Some("AI".to_string()),
            room_type: None,
            price,
            price_change: None,
            link: format!("https://tours.example/{}", row_id),
        }
    }

    /// Three matching Turkey rows, plus rows excluded by country, nights and date.
    fn scenario_catalog() -> Vec<CatalogOffer> {
        vec![
            offer(1, "Turkey", 1000.0, 5, 3),
            offer(2, "Turkey", 600.0, 6, 4),
            offer(3, "Turkey", 1400.0, 7, 5),
            offer(4, "Egypt", 100.0, 5, 3),
            offer(5, "Turkey", 100.0, 3, 3),
            offer(6, "Turkey", 100.0, 5, 20),
        ]
    }

    fn user() -> ChatUser {
        serde_json::from_value(json!({"id": USER, "is_bot": false, "first_name": "Olga"})).unwrap()
    }

    struct Engine {
        store: Arc<MemoryStore>,
        recorder: EventRecorder,
        retrieval: OfferRetrieval,
    }

    fn engine_with(store: Arc<MemoryStore>, offers: Arc<dyn OfferSetRepository>) -> Engine {
        let metrics = EngineMetrics::new().unwrap();
        let recorder = EventRecorder::new(store.clone(), store.clone(), fast_retry(), metrics.clone());
        let retrieval = OfferRetrieval::new(
            store.clone(),
            fast_retry(),
            Materializer::new(offers.clone(), fast_retry(), 100, metrics.clone()),
            Paginator::new(offers, fast_retry(), metrics),
        );
        Engine { store, recorder, retrieval }
    }

    async fn engine() -> Engine {
        let store = Arc::new(MemoryStore::new());
        store.seed_catalog(scenario_catalog()).await.unwrap();
        engine_with(store.clone(), store)
    }

    async fn record_scenario_filter(engine: &Engine) {
        let steps = [
            NewUserEvent::search_reset(USER, "search"),
            NewUserEvent::param(USER, "country", fragment(json!({"country": "Turkey"}))),
            NewUserEvent::param(USER, "min_nights", fragment(json!({"min_nights": 5}))),
            NewUserEvent::param(USER, "max_nights", fragment(json!({"max_nights": 8}))),
            NewUserEvent::param(
                USER,
                "dates",
                fragment(json!({"min_departure_date": "2024-06-01", "interval_days": 10})),
            ),
            NewUserEvent::param(USER, "num_stars", fragment(json!({"num_stars": 4}))),
        ];
        for event in &steps {
            engine.recorder.record(&user(), event).await.unwrap();
        }
    }

    fn request(offset: i64, number: i64) -> FetchRequest {
        FetchRequest { user_id: USER, params: None, offset, number }
    }

    fn row_ids(page: &Page) -> Vec<i64> {
        page.rows.iter().map(|r| r.offer.row_id).collect()
    }

    #[tokio::test]
    async fn test_full_flow_ranks_by_price_per_night() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        let first = engine.retrieval.fetch(&request(0, 2)).await.unwrap();
        assert_eq!(row_ids(&first), vec![2, 1]);
        assert_eq!(first.rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(first.next_offset(), Some(2));

        let second = engine.retrieval.fetch(&request(2, 2)).await.unwrap();
        assert_eq!(row_ids(&second), vec![3]);
        assert_eq!(second.rows[0].rank, 3);
        assert_eq!(second.next_offset(), None);

        let past_tail = engine.retrieval.fetch(&request(4, 2)).await.unwrap();
        assert!(past_tail.rows.is_empty());
        assert_eq!(past_tail.next_offset(), None);
    }

    #[tokio::test]
    async fn test_incomplete_filter_keeps_previous_set() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;
        engine.retrieval.fetch(&request(0, 10)).await.unwrap();

        engine
            .recorder
            .record(&user(), &NewUserEvent::search_reset(USER, "search"))
            .await
            .unwrap();
        engine
            .recorder
            .record(&user(), &NewUserEvent::param(USER, "country", fragment(json!({"country": "Egypt"}))))
            .await
            .unwrap();

        match engine.retrieval.fetch(&request(0, 10)).await {
            Err(CoreError::IncompleteSpecification { missing }) => assert_eq!(missing.len(), 5),
            other => panic!("expected incomplete specification, got {:?}", other),
        }
        assert_eq!(engine.store.offer_set(USER).await.len(), 3);
    }

    #[tokio::test]
    async fn test_no_match_empties_set_and_returns_empty_page() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;
        engine.retrieval.fetch(&request(0, 10)).await.unwrap();

        engine
            .recorder
            .record(&user(), &NewUserEvent::param(USER, "country", fragment(json!({"country": "Atlantis"}))))
            .await
            .unwrap();

        let page = engine.retrieval.fetch(&request(0, 10)).await.unwrap();
        assert!(page.rows.is_empty());
        assert!(engine.store.offer_set(USER).await.is_empty());
    }

    #[tokio::test]
    async fn test_params_overlay_is_applied_last() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        let mut req = request(0, 10);
        req.params = Some(fragment(json!({"country": null, "min_nights": 1})));
        let page = engine.retrieval.fetch(&req).await.unwrap();
        assert_eq!(row_ids(&page), vec![4, 5, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_params_alone_are_enough_without_history() {
        let engine = engine().await;
        let mut req = request(0, 10);
        req.params = Some(fragment(json!({
            "country": "turkey",
            "min_nights": 5,
            "max_nights": 8,
            "num_stars": 4,
            "min_departure_date": "2024-06-01",
            "interval_days": 10,
        })));
        assert_eq!(row_ids(&engine.retrieval.fetch(&req).await.unwrap()), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_materialization_is_idempotent() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        engine.retrieval.fetch(&request(0, 1)).await.unwrap();
        let once = engine.store.offer_set(USER).await;
        engine.retrieval.fetch(&request(0, 1)).await.unwrap();
        let twice = engine.store.offer_set(USER).await;

        assert_eq!(once, twice);
        assert_eq!(twice.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pages_concatenate_to_whole_set() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_catalog((1..=23).map(|i| offer(i, "Turkey", 50.0 * ((i * 7) % 11 + 1) as f64, 5, 2)))
            .await
            .unwrap();
        let engine = engine_with(store.clone(), store);
        record_scenario_filter(&engine).await;

        let mut collected: Vec<MaterializedOffer> = Vec::new();
        let mut page = engine.retrieval.fetch(&request(0, 5)).await.unwrap();
        loop {
            collected.extend(page.rows.clone());
            match page.next_offset() {
                Some(offset) => page = engine.retrieval.fetch(&request(offset, 5)).await.unwrap(),
                None => break,
            }
        }

        assert_eq!(collected, engine.store.offer_set(USER).await);
        assert_eq!(
            collected.iter().map(|r| r.rank).collect::<Vec<_>>(),
            (1..=23).collect::<Vec<i64>>()
        );
        let per_night: Vec<f64> = collected.iter().map(|r| r.offer.price / 5.0).collect();
        assert!(per_night.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_paging_never_materializes() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        let page = engine.retrieval.fetch(&request(3, 5)).await.unwrap();
        assert!(page.rows.is_empty());
        assert!(engine.store.offer_set(USER).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_page_requests() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        for (offset, number) in [(-1, 5), (0, -5), (-3, -3)] {
            assert!(matches!(
                engine.retrieval.fetch(&request(offset, number)).await,
                Err(CoreError::InvalidPage(_))
            ));
        }
        assert!(engine.store.offer_set(USER).await.is_empty());
        assert!(engine.retrieval.fetch(&request(0, 0)).await.unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_any_non_negative_window_is_served() {
        let engine = engine().await;
        record_scenario_filter(&engine).await;

        let whole = engine.retrieval.fetch(&request(0, 100)).await.unwrap();
        assert_eq!(row_ids(&whole), vec![2, 1, 3]);
        assert_eq!(whole.next_offset(), None);

        let rest = engine.retrieval.fetch(&request(1, 100)).await.unwrap();
        assert_eq!(row_ids(&rest), vec![1, 3]);

        assert!(engine.retrieval.fetch(&request(3, 100)).await.unwrap().rows.is_empty());
        assert!(engine.retrieval.fetch(&request(i64::MAX - 1, 5)).await.unwrap().rows.is_empty());
        assert!(engine.retrieval.fetch(&request(5, i64::MAX)).await.unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn test_recorder_rejects_malformed_param() {
        let engine = engine().await;
        let bad = NewUserEvent::param(USER, "min_nights", fragment(json!({"min_nights": "many"})));
        assert!(matches!(
            engine.recorder.record(&user(), &bad).await,
            Err(CoreError::MalformedEvent(_))
        ));
        assert!(engine.store.events_for(USER).await.is_empty());
        assert!(engine.store.user(USER).await.is_none());
    }

    /// Fails the first `failures` rebuilds with a transient error.
    struct FlakyOffers {
        inner: Arc<MemoryStore>,
        failures: AtomicU32,
    }

    #[async_trait]
    impl OfferSetRepository for FlakyOffers {
        async fn rebuild(&self, user_id: i64, query: &CatalogQuery, limit: usize) -> CoreResult<usize> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(CoreError::TransientStore("connection reset".to_string()));
            }
            self.inner.rebuild(user_id, query, limit).await
        }

        async fn page(&self, user_id: i64, offset: i64, number: i64) -> CoreResult<Vec<MaterializedOffer>> {
            self.inner.page(user_id, offset, number).await
        }
    }

    #[tokio::test]
    async fn test_transient_rebuild_failures_are_retried() {
        let store = Arc::new(MemoryStore::new());
        store.seed_catalog(scenario_catalog()).await.unwrap();
        let flaky = Arc::new(FlakyOffers { inner: store.clone(), failures: AtomicU32::new(2) });
        let engine = engine_with(store, flaky);
        record_scenario_filter(&engine).await;

        let page = engine.retrieval.fetch(&request(0, 10)).await.unwrap();
        assert_eq!(row_ids(&page), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_persistent_transient_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        store.seed_catalog(scenario_catalog()).await.unwrap();
        let flaky = Arc::new(FlakyOffers { inner: store.clone(), failures: AtomicU32::new(10) });
        let engine = engine_with(store, flaky);
        record_scenario_filter(&engine).await;

        assert!(matches!(
            engine.retrieval.fetch(&request(0, 10)).await,
            Err(CoreError::TransientStore(_))
        ));
    }
}
