use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use voyage_core::repository::{EventRepository, UserRepository};
use voyage_core::{CoreError, CoreResult};
use voyage_shared::{ChatUser, NewUserEvent, ParamFragment};
use crate::error::map_sqlx;

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgEventRepository {
    async fn upsert_user(&self, user: &ChatUser) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_users (user_id, is_bot, first_name, last_name, username, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET is_bot = EXCLUDED.is_bot,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                username = EXCLUDED.username,
                updated_at = NOW()
            "#,
        )
        .bind(user.id)
        .bind(user.is_bot)
        .bind(user.first_name.expose().as_str())
        .bind(user.last_name.as_ref().map(|n| n.expose().as_str()))
        .bind(user.username.as_ref().map(|n| n.expose().as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("upsert_user", e))?;

        Ok(())
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn append(&self, event: &NewUserEvent) -> CoreResult<()> {
        let param = event.param.clone().map(Value::Object);

        sqlx::query(
            r#"
            INSERT INTO user_events (user_id, kind, event_name, param)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.user_id)
        .bind(event.kind.as_str())
        .bind(event.event_name.as_str())
        .bind(param)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("append_event", e))?;

        Ok(())
    }

    async fn read_since_last_reset(&self, user_id: i64) -> CoreResult<Vec<ParamFragment>> {
        // created_at comes from clock_timestamp(); id breaks ties between equal timestamps.
        let params: Vec<Value> = sqlx::query_scalar(
            r#"
            WITH last_reset AS (
                SELECT created_at, id
                FROM user_events
                WHERE user_id = $1 AND kind = 'SEARCH_RESET'
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            SELECT e.param
            FROM user_events e
            WHERE e.user_id = $1
              AND e.kind = 'PARAM'
              AND e.param IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM last_reset r
                  WHERE (e.created_at, e.id) <= (r.created_at, r.id)
              )
            ORDER BY e.created_at ASC, e.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("read_since_last_reset", e))?;

        params
            .into_iter()
            .map(|value| match value {
                Value::Object(fragment) => Ok(fragment),
                other => Err(CoreError::MalformedEvent(format!(
                    "stored fragment for user {} is not an object: {}",
                    user_id, other
                ))),
            })
            .collect()
    }
}
