use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{PaymentRepository, StoreError};
use cinema_shared::{PaymentMethodKind, PaymentTransaction};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    transaction_id: String,
    amount: Decimal,
    method: String,
    processed_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentTransaction {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let method = PaymentMethodKind::parse(&row.method).ok_or_else(|| {
            StoreError::Corrupt(format!("payment {}: unknown method {}", row.id, row.method))
        })?;
        Ok(PaymentTransaction {
            id: row.id,
            booking_id: row.booking_id,
            transaction_id: row.transaction_id,
            amount: row.amount,
            method,
            processed_at: row.processed_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn record_payment(&self, payment: &PaymentTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (id, booking_id, transaction_id, amount, method, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(&payment.transaction_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.processed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn payments_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, booking_id, transaction_id, amount, method, processed_at
            FROM payment_transactions
            WHERE booking_id = $1
            ORDER BY processed_at
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PaymentTransaction::try_from).collect()
    }
}
