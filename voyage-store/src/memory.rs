use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use voyage_catalog::{rank_by_efficiency, select_candidates, CatalogError, CatalogOffer, CatalogQuery, MaterializedOffer};
use voyage_core::repository::{EventRepository, OfferSetRepository, UserRepository};
use voyage_core::CoreResult;
use voyage_shared::{ChatUser, EventKind, NewUserEvent, ParamFragment, UserEvent};

/// In-process implementation of every repository, for tests and local runs.
///
/// One lock guards all tables, so a rebuild is atomic for readers.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<i64, ChatUser>,
    events: HashMap<i64, Vec<UserEvent>>,
    next_event_id: i64,
    catalog: Vec<CatalogOffer>,
    offer_sets: HashMap<i64, Vec<MaterializedOffer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the scraping pipeline. Rows sharing an `offer_id` with an
    /// existing row are skipped, like the pipeline's hash dedup.
    pub async fn seed_catalog<I>(&self, offers: I) -> Result<usize, CatalogError>
    where
        I: IntoIterator<Item = CatalogOffer>,
    {
        let mut state = self.state.write().await;
        let mut added = 0;
        for offer in offers {
            offer.validate()?;
            if state.catalog.iter().any(|o| o.offer_id == offer.offer_id) {
                continue;
            }
            state.catalog.push(offer);
            added += 1;
        }
        state.catalog.sort_by_key(|o| o.row_id);
        Ok(added)
    }

    pub async fn user(&self, user_id: i64) -> Option<ChatUser> {
        self.state.read().await.users.get(&user_id).cloned()
    }

    pub async fn events_for(&self, user_id: i64) -> Vec<UserEvent> {
        self.state
            .read()
            .await
            .events
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn offer_set(&self, user_id: i64) -> Vec<MaterializedOffer> {
        self.state
            .read()
            .await
            .offer_sets
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn upsert_user(&self, user: &ChatUser) -> CoreResult<()> {
        self.state.write().await.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn append(&self, event: &NewUserEvent) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.next_event_id += 1;
        let recorded = UserEvent {
            id: state.next_event_id,
            user_id: event.user_id,
            kind: event.kind,
            event_name: event.event_name.clone(),
            param: event.param.clone(),
            created_at: Utc::now(),
        };
        state.events.entry(event.user_id).or_default().push(recorded);
        Ok(())
    }

    async fn read_since_last_reset(&self, user_id: i64) -> CoreResult<Vec<ParamFragment>> {
        let state = self.state.read().await;
        let Some(events) = state.events.get(&user_id) else {
            return Ok(Vec::new());
        };

        let start = events
            .iter()
            .rposition(|e| e.kind == EventKind::SearchReset)
            .map_or(0, |idx| idx + 1);

        Ok(events[start..]
            .iter()
            .filter(|e| e.kind == EventKind::Param)
            .filter_map(|e| e.param.clone())
            .collect())
    }
}

#[async_trait]
impl OfferSetRepository for MemoryStore {
    async fn rebuild(
        &self,
        user_id: i64,
        query: &CatalogQuery,
        candidate_limit: usize,
    ) -> CoreResult<usize> {
        let mut state = self.state.write().await;
        state.offer_sets.remove(&user_id);

        let candidates = select_candidates(&state.catalog, query, candidate_limit);
        let ranked = rank_by_efficiency(user_id, candidates);
        let count = ranked.len();
        if count > 0 {
            state.offer_sets.insert(user_id, ranked);
        }
        Ok(count)
    }

    async fn page(
        &self,
        user_id: i64,
        offset: i64,
        number: i64,
    ) -> CoreResult<Vec<MaterializedOffer>> {
        let state = self.state.read().await;
        let upper = offset.saturating_add(number);
        Ok(state
            .offer_sets
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.rank > offset && row.rank <= upper)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
