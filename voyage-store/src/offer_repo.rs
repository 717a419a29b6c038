use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use voyage_catalog::{CatalogOffer, CatalogQuery, MaterializedOffer};
use voyage_core::repository::OfferSetRepository;
use voyage_core::{CoreError, CoreResult};
use crate::error::map_sqlx;

/// Unique violation: a concurrent rebuild for the same user committed first.
const UNIQUE_VIOLATION: &str = "23505";

pub struct PgOfferSetRepository {
    pool: PgPool,
}

impl PgOfferSetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OfferRow {
    user_id: i64,
    rank: i64,
    row_id: i64,
    offer_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    title: String,
    country_name: String,
    city_name: Option<String>,
    num_nights: i32,
    num_stars: i32,
    mealplan: Option<String>,
    room_type: Option<String>,
    price: f64,
    price_change: Option<f64>,
    link: String,
}

impl From<OfferRow> for MaterializedOffer {
    fn from(row: OfferRow) -> Self {
        MaterializedOffer {
            user_id: row.user_id,
            rank: row.rank,
            offer: CatalogOffer {
                row_id: row.row_id,
                offer_id: row.offer_id,
                start_date: row.start_date,
                end_date: row.end_date,
                title: row.title,
                country: row.country_name,
                city: row.city_name,
                num_nights: row.num_nights,
                num_stars: row.num_stars,
                mealplan: row.mealplan,
                room_type: row.room_type,
                price: row.price,
                price_change: row.price_change,
                link: row.link,
            },
        }
    }
}

/// Exclusive lower and inclusive upper rank of a page. The upper bound
/// saturates so far-off windows read as empty instead of overflowing BIGINT.
fn rank_window(offset: i64, number: i64) -> (i64, i64) {
    (offset, offset.saturating_add(number))
}

fn map_rebuild_error(err: sqlx::Error) -> CoreError {
    let concurrent = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if concurrent {
        CoreError::TransientStore(format!("rebuild raced with another rebuild: {}", err))
    } else {
        map_sqlx("rebuild", err)
    }
}

#[async_trait]
impl OfferSetRepository for PgOfferSetRepository {
    async fn rebuild(
        &self,
        user_id: i64,
        query: &CatalogQuery,
        candidate_limit: usize,
    ) -> CoreResult<usize> {
        let limit = i64::try_from(candidate_limit).unwrap_or(i64::MAX);
        let mut tx = self.pool.begin().await.map_err(map_rebuild_error)?;

        sqlx::query("DELETE FROM user_offers WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_rebuild_error)?;

        // Candidates are capped in insertion order first, then ranked.
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_offers (
                user_id, offer_rank, row_id, offer_id, start_date, end_date, title,
                country_name, city_name, num_nights, num_stars, mealplan, room_type,
                price, price_change, link
            )
            SELECT
                $1,
                row_number() OVER (ORDER BY c.price / c.num_nights ASC, c.row_id ASC),
                c.row_id, c.offer_id, c.start_date, c.end_date, c.title,
                c.country_name, c.city_name, c.num_nights, c.num_stars, c.mealplan, c.room_type,
                c.price, c.price_change, c.link
            FROM (
                SELECT *
                FROM catalog_offers
                WHERE ($2::TEXT IS NULL
                       OR LOWER(REGEXP_REPLACE(country_name, '^[[:space:]]+|[[:space:]]+$', '', 'g')) = $2::TEXT)
                  AND num_nights > 0
                  AND price <> 'NaN'::FLOAT8
                  AND price >= 0
                  AND num_nights BETWEEN $3 AND $4
                  AND num_stars >= $5
                  AND start_date BETWEEN $6 AND $7
                ORDER BY row_id ASC
                LIMIT $8
            ) c
            "#,
        )
        .bind(user_id)
        .bind(query.country.as_deref())
        .bind(query.min_nights)
        .bind(query.max_nights)
        .bind(query.min_stars)
        .bind(query.departure_from)
        .bind(query.departure_to)
        .bind(limit)
        .execute(&mut *tx)
        .await
        .map_err(map_rebuild_error)?
        .rows_affected();

        tx.commit().await.map_err(map_rebuild_error)?;

        Ok(inserted as usize)
    }

    async fn page(
        &self,
        user_id: i64,
        offset: i64,
        number: i64,
    ) -> CoreResult<Vec<MaterializedOffer>> {
        let (lower, upper) = rank_window(offset, number);
        let rows: Vec<OfferRow> = sqlx::query_as(
            r#"
            SELECT user_id, offer_rank AS rank, row_id, offer_id, start_date, end_date, title,
                   country_name, city_name, num_nights, num_stars, mealplan, room_type,
                   price, price_change, link
            FROM user_offers
            WHERE user_id = $1
              AND offer_rank > $2
              AND offer_rank <= $3
            ORDER BY offer_rank ASC
            "#,
        )
        .bind(user_id)
        .bind(lower)
        .bind(upper)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("page", e))?;

        Ok(rows.into_iter().map(MaterializedOffer::from).collect())
    }
}
