use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{ShowRepository, StoreError};
use cinema_shared::Show;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgShowRepository {
    pool: PgPool,
}

impl PgShowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    id: Uuid,
    movie_title: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    base_cost: Decimal,
    premium_seats: Vec<String>,
}

impl From<ShowRow> for Show {
    fn from(row: ShowRow) -> Self {
        Show {
            id: row.id,
            movie_title: row.movie_title,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            base_cost: row.base_cost,
            premium_seats: row
                .premium_seats
                .into_iter()
                .map(|seat| seat.to_ascii_uppercase())
                .collect(),
        }
    }
}

#[async_trait]
impl ShowRepository for PgShowRepository {
    async fn get_show(&self, id: Uuid) -> Result<Option<Show>, StoreError> {
        let row: Option<ShowRow> = sqlx::query_as(
            "SELECT id, movie_title, starts_at, ends_at, base_cost, premium_seats FROM shows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }
}
