use rust_decimal::Decimal;
use uuid::Uuid;

use super::payment::PaymentMethodKind;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    /// Supervisor timer or sweep
    Expired,
    /// Found expired during a settlement attempt
    LazyCleanup,
    Cancelled,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    ReservationCreated {
        booking_id: Uuid,
        show_id: Uuid,
        seats: Vec<String>,
        amount_due: Decimal,
        expires_at: i64,
        timestamp: i64,
    },
    BookingConfirmed {
        booking_id: Uuid,
        transaction_id: String,
        amount: Decimal,
        method: PaymentMethodKind,
        timestamp: i64,
    },
    ReservationReleased {
        booking_id: Uuid,
        reason: ReleaseReason,
        timestamp: i64,
    },
    BookingCheckedIn {
        booking_id: Uuid,
        timestamp: i64,
    },
    WalletFunded {
        owner: String,
        amount: Decimal,
        balance: Decimal,
        transaction_id: String,
        timestamp: i64,
    },
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::ReservationCreated { .. } => "reservation.created",
            BookingEvent::BookingConfirmed { .. } => "booking.confirmed",
            BookingEvent::ReservationReleased { .. } => "reservation.released",
            BookingEvent::BookingCheckedIn { .. } => "booking.checked_in",
            BookingEvent::WalletFunded { .. } => "wallet.funded",
        }
    }

    /// Partition key: booking id, or wallet owner
    pub fn key(&self) -> String {
        match self {
            BookingEvent::ReservationCreated { booking_id, .. }
            | BookingEvent::BookingConfirmed { booking_id, .. }
            | BookingEvent::ReservationReleased { booking_id, .. }
            | BookingEvent::BookingCheckedIn { booking_id, .. } => booking_id.to_string(),
            BookingEvent::WalletFunded { owner, .. } => owner.clone(),
        }
    }
}
