use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_catalog::CatalogQuery;
use voyage_shared::ParamFragment;
use crate::{CoreError, CoreResult};

/// Keys that must all have been supplied before offers can be materialized.
pub const REQUIRED_KEYS: [&str; 6] = [
    "country",
    "min_nights",
    "max_nights",
    "num_stars",
    "min_departure_date",
    "interval_days",
];

const COUNTRY_ALIAS: &str = "country_name";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// `None` means "any country".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryFilter {
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightsRangeFilter {
    pub min_nights: Option<i32>,
    pub max_nights: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindowFilter {
    pub min_departure_date: Option<NaiveDate>,
    pub interval_days: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarsFilter {
    pub num_stars: i32,
}

/// A typed piece of filter state captured from one interaction step.
///
/// Inside a variant, `None` fields were absent from the raw fragment and leave
/// the accumulated value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterFragment {
    Country(CountryFilter),
    Nights(NightsRangeFilter),
    DateWindow(DateWindowFilter),
    Stars(StarsFilter),
}

impl FilterFragment {
    /// Splits a raw parameter mapping into typed fragments.
    ///
    /// Unknown keys are ignored. A known key with a value of the wrong shape
    /// makes the whole mapping malformed. `country` takes precedence over its
    /// `country_name` alias when both are present.
    pub fn parse_all(raw: &ParamFragment) -> CoreResult<Vec<FilterFragment>> {
        let mut fragments = Vec::new();

        if let Some(value) = raw.get("country").or_else(|| raw.get(COUNTRY_ALIAS)) {
            fragments.push(FilterFragment::Country(CountryFilter {
                country: parse_country(value)?,
            }));
        }

        let min_nights = raw.get("min_nights").map(|v| parse_int("min_nights", v)).transpose()?;
        let max_nights = raw.get("max_nights").map(|v| parse_int("max_nights", v)).transpose()?;
        if min_nights.is_some() || max_nights.is_some() {
            fragments.push(FilterFragment::Nights(NightsRangeFilter { min_nights, max_nights }));
        }

        let min_departure_date = raw
            .get("min_departure_date")
            .map(|v| parse_date("min_departure_date", v))
            .transpose()?;
        let interval_days = raw
            .get("interval_days")
            .map(|v| parse_int("interval_days", v))
            .transpose()?;
        if min_departure_date.is_some() || interval_days.is_some() {
            fragments.push(FilterFragment::DateWindow(DateWindowFilter {
                min_departure_date,
                interval_days,
            }));
        }

        if let Some(value) = raw.get("num_stars") {
            let num_stars = if value.is_null() { 0 } else { parse_int("num_stars", value)? };
            fragments.push(FilterFragment::Stars(StarsFilter { num_stars }));
        }

        for key in raw.keys() {
            if !REQUIRED_KEYS.contains(&key.as_str()) && key != COUNTRY_ALIAS {
                tracing::debug!("Ignoring unknown filter key {}", key);
            }
        }

        Ok(fragments)
    }
}

fn parse_country(value: &Value) -> CoreResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(CoreError::MalformedEvent(format!(
            "country must be a string or null, got {}",
            other
        ))),
    }
}

fn parse_int(key: &str, value: &Value) -> CoreResult<i32> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| CoreError::MalformedEvent(format!("{} must be an integer, got {}", key, value)))
}

fn parse_date(key: &str, value: &Value) -> CoreResult<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
        .ok_or_else(|| {
            CoreError::MalformedEvent(format!("{} must be a YYYY-MM-DD date, got {}", key, value))
        })
}

/// The fully merged filter a user's offers are materialized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub country: Option<String>,
    pub min_nights: i32,
    pub max_nights: i32,
    pub num_stars: i32,
    pub min_departure_date: NaiveDate,
    pub interval_days: i32,
}

impl FilterSpec {
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_nights < 1 {
            return Err(CoreError::InvalidFilter(format!(
                "min_nights must be at least 1, got {}",
                self.min_nights
            )));
        }
        if self.min_nights > self.max_nights {
            return Err(CoreError::InvalidFilter(format!(
                "min_nights {} exceeds max_nights {}",
                self.min_nights, self.max_nights
            )));
        }
        if self.interval_days < 0 {
            return Err(CoreError::InvalidFilter(format!(
                "interval_days must not be negative, got {}",
                self.interval_days
            )));
        }
        self.max_departure_date().map(|_| ())
    }

    /// Last admissible departure date, inclusive.
    pub fn max_departure_date(&self) -> CoreResult<NaiveDate> {
        let days = u64::try_from(self.interval_days)
            .map_err(|_| CoreError::InvalidFilter("interval_days must not be negative".to_string()))?;
        self.min_departure_date
            .checked_add_days(Days::new(days))
            .ok_or_else(|| CoreError::InvalidFilter("departure window overflows the calendar".to_string()))
    }

    pub fn to_catalog_query(&self) -> CoreResult<CatalogQuery> {
        self.validate()?;
        Ok(CatalogQuery::new(
            self.country.as_deref(),
            self.min_nights,
            self.max_nights,
            self.num_stars,
            self.min_departure_date,
            self.max_departure_date()?,
        ))
    }
}
