use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::offer::CatalogOffer;

/// Row predicate applied to the catalog when materializing a user's offers.
///
/// Both ends of the nights and departure ranges are inclusive. `country` is
/// stored normalized (see [`normalize_country`]); `None` matches every country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub country: Option<String>,
    pub min_nights: i32,
    pub max_nights: i32,
    pub min_stars: i32,
    pub departure_from: NaiveDate,
    pub departure_to: NaiveDate,
}

/// Country names from the scraper carry stray whitespace and mixed case.
pub fn normalize_country(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl CatalogQuery {
    pub fn new(
        country: Option<&str>,
        min_nights: i32,
        max_nights: i32,
        min_stars: i32,
        departure_from: NaiveDate,
        departure_to: NaiveDate,
    ) -> Self {
        Self {
            country: country.map(normalize_country).filter(|c| !c.is_empty()),
            min_nights,
            max_nights,
            min_stars,
            departure_from,
            departure_to,
        }
    }

    pub fn matches(&self, offer: &CatalogOffer) -> bool {
        if offer.validate().is_err() {
            return false;
        }
        if let Some(country) = &self.country {
            if normalize_country(&offer.country) != *country {
                return false;
            }
        }
        offer.num_nights >= self.min_nights
            && offer.num_nights <= self.max_nights
            && offer.num_stars >= self.min_stars
            && offer.start_date >= self.departure_from
            && offer.start_date <= self.departure_to
    }
}
