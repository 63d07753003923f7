use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub owner: String,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    Add,
    Deduct,
    Refund,
}

impl WalletTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Add => "ADD",
            WalletTransactionType::Deduct => "DEDUCT",
            WalletTransactionType::Refund => "REFUND",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADD" => Some(WalletTransactionType::Add),
            "DEDUCT" => Some(WalletTransactionType::Deduct),
            "REFUND" => Some(WalletTransactionType::Refund),
            _ => None,
        }
    }
}

/// Append-only wallet ledger entry. `amount` is the signed delta applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub owner: String,
    pub transaction_id: String,
    pub kind: WalletTransactionType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
