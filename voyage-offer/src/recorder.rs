use std::sync::Arc;
use tracing::info;
use voyage_core::repository::{EventRepository, UserRepository};
use voyage_core::{CoreError, CoreResult, FilterFragment, RetryPolicy};
use voyage_shared::{ChatUser, EventKind, NewUserEvent};
use crate::metrics::EngineMetrics;

/// Records chat users and their interaction events.
pub struct EventRecorder {
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventRepository>,
    retry: RetryPolicy,
    metrics: EngineMetrics,
}

impl EventRecorder {
    pub fn new(
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventRepository>,
        retry: RetryPolicy,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            users,
            events,
            retry,
            metrics,
        }
    }

    /// Upserts the user, then appends the event.
    ///
    /// PARAM fragments are parsed before anything is written, so a malformed
    /// fragment never reaches the log. A retried append may store the event
    /// twice; duplicates do not change the merged filter.
    pub async fn record(&self, user: &ChatUser, event: &NewUserEvent) -> CoreResult<()> {
        if let Some(reason) = user.validation_error() {
            return Err(CoreError::MalformedEvent(reason));
        }
        if event.user_id != user.id {
            return Err(CoreError::MalformedEvent(format!(
                "event user {} does not match user {}",
                event.user_id, user.id
            )));
        }
        if event.kind == EventKind::Param {
            match &event.param {
                Some(param) => {
                    FilterFragment::parse_all(param)?;
                }
                None => {
                    return Err(CoreError::MalformedEvent(
                        "PARAM event without a parameter fragment".to_string(),
                    ))
                }
            }
        }

        self.retry
            .run("upsert_user", || self.users.upsert_user(user))
            .await?;
        self.retry.run("append", || self.events.append(event)).await?;

        self.metrics
            .events_appended
            .with_label_values(&[event.kind.as_str()])
            .inc();
        info!("Recorded {} event '{}' for user {}", event.kind, event.event_name, user.id);
        Ok(())
    }
}
