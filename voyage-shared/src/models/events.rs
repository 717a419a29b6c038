use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A loosely typed parameter fragment as sent by the chat front-end.
pub type ParamFragment = Map<String, Value>;

/// Kind of an interaction event in a user's log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Starts a new search. Fragments recorded before it stop counting.
    SearchReset,
    /// Carries one parameter fragment.
    Param,
    /// Any other interaction (paging, start, help).
    Scroll,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SearchReset => "SEARCH_RESET",
            EventKind::Param => "PARAM",
            EventKind::Scroll => "SCROLL",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event as read back from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub id: i64,
    pub user_id: i64,
    pub kind: EventKind,
    pub event_name: String,
    pub param: Option<ParamFragment>,
    pub created_at: DateTime<Utc>,
}

/// An event waiting to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserEvent {
    pub user_id: i64,
    pub kind: EventKind,
    pub event_name: String,
    pub param: Option<ParamFragment>,
}

impl NewUserEvent {
    pub fn search_reset(user_id: i64, event_name: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: EventKind::SearchReset,
            event_name: event_name.into(),
            param: None,
        }
    }

    pub fn param(user_id: i64, event_name: impl Into<String>, param: ParamFragment) -> Self {
        Self {
            user_id,
            kind: EventKind::Param,
            event_name: event_name.into(),
            param: Some(param),
        }
    }

    pub fn scroll(user_id: i64, event_name: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: EventKind::Scroll,
            event_name: event_name.into(),
            param: None,
        }
    }
}
