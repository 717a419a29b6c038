use async_trait::async_trait;
use voyage_catalog::{CatalogQuery, MaterializedOffer};
use voyage_shared::{ChatUser, NewUserEvent, ParamFragment};
use crate::CoreResult;

/// Identity records of chat users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Replaces the stored identity for `user.id`.
    async fn upsert_user(&self, user: &ChatUser) -> CoreResult<()>;
}

/// Append-only per-user interaction log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Durable append. Does not retry and does not deduplicate.
    async fn append(&self, event: &NewUserEvent) -> CoreResult<()>;

    /// PARAM fragments recorded strictly after the user's latest SEARCH_RESET,
    /// oldest first. Empty when there are none.
    async fn read_since_last_reset(&self, user_id: i64) -> CoreResult<Vec<ParamFragment>>;
}

/// Per-user materialized, ranked result sets.
#[async_trait]
pub trait OfferSetRepository: Send + Sync {
    /// Deletes the user's current set and rebuilds it from the catalog rows
    /// matching `query`, at most `candidate_limit` of them, ranked by price per
    /// night. Returns the number of rows in the new set.
    async fn rebuild(
        &self,
        user_id: i64,
        query: &CatalogQuery,
        candidate_limit: usize,
    ) -> CoreResult<usize>;

    /// Rows with `offset < rank <= offset + number`, ascending by rank.
    async fn page(
        &self,
        user_id: i64,
        offset: i64,
        number: i64,
    ) -> CoreResult<Vec<MaterializedOffer>>;
}
