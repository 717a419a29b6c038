use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use crate::offer::CatalogOffer;
use crate::query::CatalogQuery;

/// One row of a user's materialized result set.
///
/// `rank` is 1-based and dense within the user's set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedOffer {
    pub user_id: i64,
    pub rank: i64,
    #[serde(flatten)]
    pub offer: CatalogOffer,
}

/// Picks at most `limit` matching rows, walking the catalog in insertion order.
pub fn select_candidates<'a, I>(catalog: I, query: &CatalogQuery, limit: usize) -> Vec<CatalogOffer>
where
    I: IntoIterator<Item = &'a CatalogOffer>,
{
    let mut rows: Vec<&CatalogOffer> = catalog
        .into_iter()
        .filter(|offer| query.matches(offer))
        .collect();
    rows.sort_by_key(|offer| offer.row_id);
    rows.into_iter().take(limit).cloned().collect()
}

/// Orders candidates by ascending price per night and numbers them 1..K.
///
/// Equal prices per night keep catalog insertion order.
pub fn rank_by_efficiency(user_id: i64, mut candidates: Vec<CatalogOffer>) -> Vec<MaterializedOffer> {
    candidates.sort_by(|a, b| compare_efficiency(a, b));
    candidates
        .into_iter()
        .enumerate()
        .map(|(idx, offer)| MaterializedOffer {
            user_id,
            rank: idx as i64 + 1,
            offer,
        })
        .collect()
}

fn compare_efficiency(a: &CatalogOffer, b: &CatalogOffer) -> Ordering {
    let pa = a.price_per_night().unwrap_or(f64::INFINITY);
    let pb = b.price_per_night().unwrap_or(f64::INFINITY);
    pa.total_cmp(&pb).then_with(|| a.row_id.cmp(&b.row_id))
}
