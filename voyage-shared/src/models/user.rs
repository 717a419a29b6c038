use serde::{Deserialize, Serialize};
use crate::pii::Masked;

/// Identity of the chat user an event was recorded for.
///
/// Mirrors the `from` object of the messenger update. Name fields are
/// personal data and stay masked in logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Masked<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Masked<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<Masked<String>>,
}

impl ChatUser {
    /// Returns a description of the first problem found, if any.
    pub fn validation_error(&self) -> Option<String> {
        if self.id <= 0 {
            return Some(format!("user id must be positive, got {}", self.id));
        }
        if self.first_name.expose().trim().is_empty() {
            return Some("user first_name must not be empty".to_string());
        }
        None
    }
}
