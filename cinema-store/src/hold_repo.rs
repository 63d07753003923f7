use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{HoldClaim, HoldRepository, StoreError};
use cinema_shared::ReservationHold;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgHoldRepository {
    pool: PgPool,
}

impl PgHoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    booking_id: Uuid,
    expires_at: DateTime<Utc>,
    claimed_until: Option<DateTime<Utc>>,
}

impl From<HoldRow> for ReservationHold {
    fn from(row: HoldRow) -> Self {
        ReservationHold {
            booking_id: row.booking_id,
            expires_at: row.expires_at,
            claimed_until: row.claimed_until,
        }
    }
}

#[async_trait]
impl HoldRepository for PgHoldRepository {
    async fn insert_hold(&self, hold: &ReservationHold) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reservation_holds (booking_id, expires_at, claimed_until) VALUES ($1, $2, $3)",
        )
        .bind(hold.booking_id)
        .bind(hold.expires_at)
        .bind(hold.claimed_until)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_hold(&self, booking_id: Uuid) -> Result<Option<ReservationHold>, StoreError> {
        let row: Option<HoldRow> = sqlx::query_as(
            "SELECT booking_id, expires_at, claimed_until FROM reservation_holds WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn claim_hold(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<HoldClaim, StoreError> {
        let claimed: Option<HoldRow> = sqlx::query_as(
            r#"
            UPDATE reservation_holds
            SET claimed_until = $3
            WHERE booking_id = $1
              AND expires_at > $2
              AND (claimed_until IS NULL OR claimed_until <= $2)
            RETURNING booking_id, expires_at, claimed_until
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = claimed {
            return Ok(HoldClaim::Claimed(row.into()));
        }

        // Work out why the conditional update matched nothing
        Ok(match self.get_hold(booking_id).await? {
            None => HoldClaim::Missing,
            Some(hold) if hold.active_claim(now).is_some() => HoldClaim::Busy(hold),
            Some(hold) if hold.is_expired(now) => HoldClaim::Expired(hold),
            // Claim released between the two statements; let the caller retry
            Some(hold) => HoldClaim::Busy(hold),
        })
    }

    async fn release_claim(&self, booking_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE reservation_holds SET claimed_until = NULL WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_hold(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservation_holds WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_holds(&self) -> Result<Vec<ReservationHold>, StoreError> {
        let rows: Vec<HoldRow> = sqlx::query_as(
            "SELECT booking_id, expires_at, claimed_until FROM reservation_holds ORDER BY expires_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
