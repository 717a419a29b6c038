//! Driver-side state machine for the filter dialogue.
//!
//! The chat front-end feeds user input in and sends out whatever
//! [`DriverCommand`]s come back, in order. Following it guarantees the ordering
//! contract the retrieval engine relies on: a SEARCH_RESET precedes the
//! fragments of a search, one PARAM event per stage, page 0 (which
//! materializes) only once every stage is answered, and later pages never
//! re-materialize.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use voyage_shared::NewUserEvent;
use crate::filter::FilterFragment;
use crate::{CoreError, CoreResult};

const SEARCH_EVENT: &str = "search";
const SHOW_MORE_EVENT: &str = "more";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    AwaitCountry,
    AwaitDepartureDate,
    AwaitInterval,
    AwaitMinNights,
    AwaitMaxNights,
    AwaitStars,
    Ready,
}

impl Stage {
    /// Filter key collected in this stage.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Stage::AwaitCountry => Some("country"),
            Stage::AwaitDepartureDate => Some("min_departure_date"),
            Stage::AwaitInterval => Some("interval_days"),
            Stage::AwaitMinNights => Some("min_nights"),
            Stage::AwaitMaxNights => Some("max_nights"),
            Stage::AwaitStars => Some("num_stars"),
            Stage::Ready => None,
        }
    }

    pub fn next(&self) -> Stage {
        match self {
            Stage::AwaitCountry => Stage::AwaitDepartureDate,
            Stage::AwaitDepartureDate => Stage::AwaitInterval,
            Stage::AwaitInterval => Stage::AwaitMinNights,
            Stage::AwaitMinNights => Stage::AwaitMaxNights,
            Stage::AwaitMaxNights => Stage::AwaitStars,
            Stage::AwaitStars | Stage::Ready => Stage::Ready,
        }
    }
}

pub struct CountryOption {
    pub label: &'static str,
    /// Catalog value; `None` means any country.
    pub value: Option<&'static str>,
}

pub const COUNTRY_MENU: [CountryOption; 4] = [
    CountryOption { label: "UAE", value: Some("UAE") },
    CountryOption { label: "Thailand", value: Some("Thailand") },
    CountryOption { label: "Egypt", value: Some("Egypt") },
    CountryOption { label: "Any", value: None },
];

/// Choice payload for the country menu entry at `index`.
pub fn country_choice(index: usize) -> Option<Value> {
    COUNTRY_MENU
        .get(index)
        .map(|option| option.value.map_or(Value::Null, |v| Value::String(v.to_string())))
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    /// "/search": start over.
    Search,
    /// Answer to the current stage's question.
    Choice(Value),
    ShowMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub user_id: i64,
    pub offset: i64,
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Append(NewUserEvent),
    FetchPage(PageRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverReply {
    Offers { shown: usize, more_available: bool },
    NothingFound,
    EndOfResults,
    /// Shown instead of any partial or stale list.
    TryAgain,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    user_id: i64,
    page_size: i64,
    stage: Stage,
    next_offset: i64,
    in_flight: Option<i64>,
    exhausted: bool,
}

impl Conversation {
    /// Opens a dialogue; the returned commands carry the initial SEARCH_RESET.
    pub fn start(user_id: i64, page_size: i64) -> (Self, Vec<DriverCommand>) {
        let mut conversation = Self {
            user_id,
            page_size: page_size.max(1),
            stage: Stage::AwaitCountry,
            next_offset: 0,
            in_flight: None,
            exhausted: false,
        };
        let commands = conversation.restart();
        (conversation, commands)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    pub fn handle(&mut self, input: UserInput) -> CoreResult<Vec<DriverCommand>> {
        match input {
            UserInput::Search => Ok(self.restart()),
            UserInput::Choice(value) => self.choose(value),
            UserInput::ShowMore => self.show_more(),
        }
    }

    /// Classifies the outcome of the last page request for the user.
    pub fn on_page(&mut self, outcome: CoreResult<usize>) -> DriverReply {
        let offset = self.in_flight.take().unwrap_or(self.next_offset);
        match outcome {
            Ok(0) if offset == 0 => {
                self.exhausted = true;
                DriverReply::NothingFound
            }
            Ok(0) => {
                self.exhausted = true;
                DriverReply::EndOfResults
            }
            Ok(shown) => {
                self.next_offset = offset + self.page_size;
                self.exhausted = (shown as i64) < self.page_size;
                DriverReply::Offers {
                    shown,
                    more_available: !self.exhausted,
                }
            }
            Err(err) => {
                tracing::warn!("Page {} for user {} failed: {}", offset, self.user_id, err);
                DriverReply::TryAgain
            }
        }
    }

    fn restart(&mut self) -> Vec<DriverCommand> {
        self.stage = Stage::AwaitCountry;
        self.next_offset = 0;
        self.in_flight = None;
        self.exhausted = false;
        vec![DriverCommand::Append(NewUserEvent::search_reset(self.user_id, SEARCH_EVENT))]
    }

    fn choose(&mut self, value: Value) -> CoreResult<Vec<DriverCommand>> {
        let key = self.stage.key().ok_or_else(|| {
            CoreError::MalformedEvent("no choice is expected once results are shown".to_string())
        })?;

        let mut param = Map::new();
        param.insert(key.to_string(), value);
        FilterFragment::parse_all(&param)?;

        let mut commands = vec![DriverCommand::Append(NewUserEvent::param(self.user_id, key, param))];
        self.stage = self.stage.next();
        if self.stage == Stage::Ready {
            commands.push(self.fetch(0));
        }
        Ok(commands)
    }

    fn show_more(&mut self) -> CoreResult<Vec<DriverCommand>> {
        if self.stage != Stage::Ready {
            return Err(CoreError::MalformedEvent(
                "more results requested before the search is complete".to_string(),
            ));
        }
        if self.exhausted {
            return Ok(Vec::new());
        }
        Ok(vec![
            DriverCommand::Append(NewUserEvent::scroll(self.user_id, SHOW_MORE_EVENT)),
            self.fetch(self.next_offset),
        ])
    }

    fn fetch(&mut self, offset: i64) -> DriverCommand {
        self.in_flight = Some(offset);
        DriverCommand::FetchPage(PageRequest {
            user_id: self.user_id,
            offset,
            number: self.page_size,
        })
    }
}
