use chrono::NaiveDate;
use voyage_shared::ParamFragment;
use crate::filter::{FilterFragment, FilterSpec};
use crate::{CoreError, CoreResult};

/// Filter state folded from fragments, before the completeness check.
///
/// Every field tracks whether the key was supplied at all; `country` is doubly
/// optional because an explicit "any country" is a valid supplied value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDraft {
    pub country: Option<Option<String>>,
    pub min_nights: Option<i32>,
    pub max_nights: Option<i32>,
    pub num_stars: Option<i32>,
    pub min_departure_date: Option<NaiveDate>,
    pub interval_days: Option<i32>,
}

impl FilterDraft {
    /// Last writer wins, field by field.
    pub fn apply(&mut self, fragment: &FilterFragment) {
        match fragment {
            FilterFragment::Country(f) => self.country = Some(f.country.clone()),
            FilterFragment::Nights(f) => {
                if let Some(min) = f.min_nights {
                    self.min_nights = Some(min);
                }
                if let Some(max) = f.max_nights {
                    self.max_nights = Some(max);
                }
            }
            FilterFragment::DateWindow(f) => {
                if let Some(date) = f.min_departure_date {
                    self.min_departure_date = Some(date);
                }
                if let Some(days) = f.interval_days {
                    self.interval_days = Some(days);
                }
            }
            FilterFragment::Stars(f) => self.num_stars = Some(f.num_stars),
        }
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.country.is_none() {
            missing.push("country");
        }
        if self.min_nights.is_none() {
            missing.push("min_nights");
        }
        if self.max_nights.is_none() {
            missing.push("max_nights");
        }
        if self.num_stars.is_none() {
            missing.push("num_stars");
        }
        if self.min_departure_date.is_none() {
            missing.push("min_departure_date");
        }
        if self.interval_days.is_none() {
            missing.push("interval_days");
        }
        missing
    }

    pub fn finish(self) -> CoreResult<FilterSpec> {
        match self {
            FilterDraft {
                country: Some(country),
                min_nights: Some(min_nights),
                max_nights: Some(max_nights),
                num_stars: Some(num_stars),
                min_departure_date: Some(min_departure_date),
                interval_days: Some(interval_days),
            } => {
                let spec = FilterSpec {
                    country,
                    min_nights,
                    max_nights,
                    num_stars,
                    min_departure_date,
                    interval_days,
                };
                spec.validate()?;
                Ok(spec)
            }
            incomplete => Err(CoreError::IncompleteSpecification {
                missing: incomplete.missing_keys(),
            }),
        }
    }
}

/// Folds typed fragments left to right into a complete [`FilterSpec`].
pub fn merge_fragments<'a, I>(fragments: I) -> CoreResult<FilterSpec>
where
    I: IntoIterator<Item = &'a FilterFragment>,
{
    let mut draft = FilterDraft::default();
    for fragment in fragments {
        draft.apply(fragment);
    }
    draft.finish()
}

/// Parses raw fragments in order, then merges them.
pub fn merge_raw(raw: &[ParamFragment]) -> CoreResult<FilterSpec> {
    let mut typed = Vec::new();
    for fragment in raw {
        typed.extend(FilterFragment::parse_all(fragment)?);
    }
    merge_fragments(&typed)
}
