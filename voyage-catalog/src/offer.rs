use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tour offer row of the shared catalog.
///
/// The catalog is filled by the scraping pipeline; this workspace only reads it.
/// `row_id` is the insertion sequence and `offer_id` the stable content hash the
/// pipeline uses for dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogOffer {
    pub row_id: i64,
    pub offer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub title: String,
    pub country: String,
    pub city: Option<String>,
    pub num_nights: i32,
    pub num_stars: i32,
    pub mealplan: Option<String>,
    pub room_type: Option<String>,
    pub price: f64,
    pub price_change: Option<f64>,
    pub link: String,
}

impl CatalogOffer {
    /// Price per night, the ranking key. `None` for rows with no nights.
    pub fn price_per_night(&self) -> Option<f64> {
        if self.num_nights > 0 {
            Some(self.price / self.num_nights as f64)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.num_nights <= 0 {
            return Err(CatalogError::InvalidNights {
                offer_id: self.offer_id.clone(),
                num_nights: self.num_nights,
            });
        }
        if self.price.is_nan() || self.price < 0.0 {
            return Err(CatalogError::InvalidPrice {
                offer_id: self.offer_id.clone(),
                price: self.price,
            });
        }
        if self.offer_id.is_empty() {
            return Err(CatalogError::MissingOfferId(self.row_id));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Offer {offer_id} has non-positive num_nights {num_nights}")]
    InvalidNights { offer_id: String, num_nights: i32 },

    #[error("Offer {offer_id} has invalid price {price}")]
    InvalidPrice { offer_id: String, price: f64 },

    #[error("Catalog row {0} has no offer id")]
    MissingOfferId(i64),
}
