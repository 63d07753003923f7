use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{BookingRepository, PendingRelease, StoreError};
use cinema_shared::{Booking, BookingOwner, BookingStatus, PaymentType, WalkInCustomer};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, show_id, owner_kind, username, walk_in_name, walk_in_phone, \
     walk_in_email, seat_count, amount, status, payment_type, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    show_id: Uuid,
    owner_kind: String,
    username: Option<String>,
    walk_in_name: Option<String>,
    walk_in_phone: Option<String>,
    walk_in_email: Option<String>,
    seat_count: i32,
    amount: Decimal,
    status: String,
    payment_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| StoreError::Corrupt(format!("booking {}: {}", row.id, what));

        let owner = match row.owner_kind.as_str() {
            "CUSTOMER" => BookingOwner::Customer {
                username: row.username.clone().ok_or_else(|| corrupt("customer without username"))?,
            },
            "WALK_IN" => BookingOwner::WalkIn(WalkInCustomer {
                name: row.walk_in_name.clone().ok_or_else(|| corrupt("walk-in without name"))?,
                phone: row.walk_in_phone.clone().ok_or_else(|| corrupt("walk-in without phone"))?,
                email: row.walk_in_email.clone(),
            }),
            other => return Err(corrupt(&format!("unknown owner kind {}", other))),
        };
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| corrupt(&format!("unknown status {}", row.status)))?;
        let payment_type = PaymentType::parse(&row.payment_type)
            .ok_or_else(|| corrupt(&format!("unknown payment type {}", row.payment_type)))?;
        let seat_count = u32::try_from(row.seat_count).map_err(|_| corrupt("negative seat count"))?;

        Ok(Booking {
            id: row.id,
            show_id: row.show_id,
            owner,
            seat_count,
            amount: row.amount,
            status,
            payment_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let (owner_kind, username, walk_in) = match &booking.owner {
            BookingOwner::Customer { username } => ("CUSTOMER", Some(username.as_str()), None),
            BookingOwner::WalkIn(customer) => ("WALK_IN", None, Some(customer)),
        };
        let seat_count = i32::try_from(booking.seat_count)
            .map_err(|_| StoreError::Corrupt(format!("seat count {} out of range", booking.seat_count)))?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, show_id, owner_kind, username, walk_in_name, walk_in_phone,
                                  walk_in_email, seat_count, amount, status, payment_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(booking.id)
        .bind(booking.show_id)
        .bind(owner_kind)
        .bind(username)
        .bind(walk_in.map(|c| c.name.as_str()))
        .bind(walk_in.map(|c| c.phone.as_str()))
        .bind(walk_in.and_then(|c| c.email.as_deref()))
        .bind(seat_count)
        .bind(booking.amount)
        .bind(booking.status.as_str())
        .bind(booking.payment_type.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn insert_seats(
        &self,
        booking_id: Uuid,
        show_id: Uuid,
        seats: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for (position, seat) in seats.iter().enumerate() {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, show_id, seat_number, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(booking_id)
            .bind(show_id)
            .bind(seat)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_by_customer(&self, username: &str) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE username = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn seats_for_booking(&self, booking_id: Uuid) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(
            "SELECT seat_number FROM booking_seats WHERE booking_id = $1 ORDER BY position",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn taken_seats(&self, show_id: Uuid, seats: &[String]) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(
            r#"
            SELECT s.seat_number
            FROM booking_seats s
            JOIN bookings b ON b.id = s.booking_id
            WHERE s.show_id = $1
              AND s.seat_number = ANY($2)
              AND b.status IN ('PENDING', 'CONFIRMED', 'CHECKED_IN')
            "#,
        )
        .bind(show_id)
        .bind(seats)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        // Seats and hold go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<PendingRelease, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Row lock orders this against a concurrent claim_hold
        let lease: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT claimed_until FROM reservation_holds WHERE booking_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if let Some(Some(until)) = lease {
            if until > now {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Ok(PendingRelease::Claimed(until));
            }
        }

        let result = sqlx::query("DELETE FROM bookings WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(if result.rows_affected() == 1 {
            PendingRelease::Released
        } else {
            PendingRelease::NotPending
        })
    }
}
