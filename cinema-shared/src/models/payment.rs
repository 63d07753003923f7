use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pii::Masked;

/// Card data handed to the payment gateway. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub card_number: Masked<String>,
    pub cvv: Masked<String>,
    /// MM/YY
    pub expiry: String,
    pub holder_name: String,
}

impl CardDetails {
    pub fn new(
        card_number: impl Into<String>,
        cvv: impl Into<String>,
        expiry: impl Into<String>,
        holder_name: impl Into<String>,
    ) -> Self {
        Self {
            card_number: Masked::new(card_number.into()),
            cvv: Masked::new(cvv.into()),
            expiry: expiry.into(),
            holder_name: holder_name.into(),
        }
    }
}

/// How the caller intends to settle a booking
#[derive(Debug, Clone)]
pub enum PaymentMethod {
    Card(CardDetails),
    Wallet,
    /// Box-office cash, walk-in bookings only
    Cash,
}

impl PaymentMethod {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            PaymentMethod::Card(_) => PaymentMethodKind::Card,
            PaymentMethod::Wallet => PaymentMethodKind::Wallet,
            PaymentMethod::Cash => PaymentMethodKind::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodKind {
    Card,
    Wallet,
    Cash,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodKind::Card => "CARD",
            PaymentMethodKind::Wallet => "WALLET",
            PaymentMethodKind::Cash => "CASH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CARD" => Some(PaymentMethodKind::Card),
            "WALLET" => Some(PaymentMethodKind::Wallet),
            "CASH" => Some(PaymentMethodKind::Cash),
            _ => None,
        }
    }
}

/// Immutable record of a successful charge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Processor reference
    pub transaction_id: String,
    pub amount: Decimal,
    pub method: PaymentMethodKind,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub booking_id: Uuid,
    pub transaction_id: String,
    pub movie_title: String,
    pub show_starts_at: DateTime<Utc>,
    pub seats: Vec<String>,
    pub amount: Decimal,
    pub method: PaymentMethodKind,
    pub processed_at: DateTime<Utc>,
}
