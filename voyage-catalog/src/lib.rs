pub mod offer;
pub mod query;
pub mod ranking;

pub use offer::{CatalogError, CatalogOffer};
pub use query::{normalize_country, CatalogQuery};
pub use ranking::{rank_by_efficiency, select_candidates, MaterializedOffer};
