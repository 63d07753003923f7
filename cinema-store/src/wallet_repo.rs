use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{BalanceUpdate, StoreError, WalletRepository};
use cinema_shared::{Wallet, WalletTransaction, WalletTransactionType};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    owner: String,
    balance: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            owner: row.owner,
            balance: row.balance,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WalletTransactionRow {
    id: Uuid,
    owner: String,
    transaction_id: String,
    kind: String,
    amount: Decimal,
    balance_after: Decimal,
    booking_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletTransactionRow> for WalletTransaction {
    type Error = StoreError;

    fn try_from(row: WalletTransactionRow) -> Result<Self, Self::Error> {
        let kind = WalletTransactionType::parse(&row.kind).ok_or_else(|| {
            StoreError::Corrupt(format!("wallet transaction {}: unknown kind {}", row.id, row.kind))
        })?;
        Ok(WalletTransaction {
            id: row.id,
            owner: row.owner,
            transaction_id: row.transaction_id,
            kind,
            amount: row.amount,
            balance_after: row.balance_after,
            booking_id: row.booking_id,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create_wallet(&self, owner: &str, now: DateTime<Utc>) -> Result<Wallet, StoreError> {
        sqlx::query(
            "INSERT INTO wallets (owner, balance, updated_at) VALUES ($1, 0, $2) ON CONFLICT (owner) DO NOTHING",
        )
        .bind(owner)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        self.get_wallet(owner)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("wallet {}", owner)))
    }

    async fn get_wallet(&self, owner: &str) -> Result<Option<Wallet>, StoreError> {
        let row: Option<WalletRow> =
            sqlx::query_as("SELECT owner, balance, updated_at FROM wallets WHERE owner = $1")
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn apply_delta(
        &self,
        owner: &str,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<BalanceUpdate, StoreError> {
        // Single guarded statement, so concurrent deltas serialize on the row lock
        let applied: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE wallets SET balance = balance + $2, updated_at = $3
            WHERE owner = $1 AND balance + $2 >= 0
            RETURNING balance
            "#,
        )
        .bind(owner)
        .bind(delta)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(balance) = applied {
            return Ok(BalanceUpdate::Applied(balance));
        }
        Ok(match self.get_wallet(owner).await? {
            Some(wallet) => BalanceUpdate::Insufficient(wallet.balance),
            None => BalanceUpdate::NoWallet,
        })
    }

    async fn append_transaction(&self, entry: &WalletTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, owner, transaction_id, kind, amount, balance_after, booking_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.owner)
        .bind(&entry.transaction_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(entry.booking_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn transactions(&self, owner: &str) -> Result<Vec<WalletTransaction>, StoreError> {
        let rows: Vec<WalletTransactionRow> = sqlx::query_as(
            r#"
            SELECT id, owner, transaction_id, kind, amount, balance_after, booking_id, created_at
            FROM wallet_transactions
            WHERE owner = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(WalletTransaction::try_from).collect()
    }
}
