use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_core::{CoreError, CoreResult};
use voyage_shared::{ChatUser, NewUserEvent, ParamFragment};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(record_event))
}

/// One interaction step reported by the chat front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub user: ChatUser,
    pub event: String,
    #[serde(default)]
    pub clear: bool,
    /// JSON object encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl EventRequest {
    /// `clear` starts a new search; otherwise a parameter makes it a filter
    /// step and its absence a plain navigation event.
    pub fn to_event(&self) -> CoreResult<NewUserEvent> {
        let param = self.param.as_deref().map(parse_param).transpose()?;
        let event = match (self.clear, param) {
            (true, param) => NewUserEvent {
                param,
                ..NewUserEvent::search_reset(self.user.id, self.event.as_str())
            },
            (false, Some(param)) => NewUserEvent::param(self.user.id, self.event.as_str(), param),
            (false, None) => NewUserEvent::scroll(self.user.id, self.event.as_str()),
        };
        Ok(event)
    }
}

fn parse_param(raw: &str) -> CoreResult<ParamFragment> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CoreError::MalformedEvent(format!(
            "param must encode a JSON object, got {}",
            other
        ))),
        Err(e) => Err(CoreError::MalformedEvent(format!("param is not valid JSON: {}", e))),
    }
}

/// POST /events
async fn record_event(
    State(state): State<AppState>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> Result<Json<EventRequest>, AppError> {
    let Json(body) = payload?;
    let event = body.to_event()?;
    state.recorder.record(&body.user, &event).await?;
    Ok(Json(body))
}
