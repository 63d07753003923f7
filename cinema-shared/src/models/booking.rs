use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking status in the reservation lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CHECKED_IN" => Some(BookingStatus::CheckedIn),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether seat assignments of a booking in this status block the seat.
    pub fn occupies_seats(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Card,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "CASH",
            PaymentType::Card => "CARD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CASH" => Some(PaymentType::Cash),
            "CARD" => Some(PaymentType::Card),
            _ => None,
        }
    }
}

/// Customer served at the box office without an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalkInCustomer {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingOwner {
    Customer { username: String },
    WalkIn(WalkInCustomer),
}

impl BookingOwner {
    pub fn customer(username: impl Into<String>) -> Self {
        BookingOwner::Customer {
            username: username.into(),
        }
    }

    /// Username of a registered owner, `None` for walk-ins.
    pub fn username(&self) -> Option<&str> {
        match self {
            BookingOwner::Customer { username } => Some(username),
            BookingOwner::WalkIn(_) => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            BookingOwner::Customer { username } => username,
            BookingOwner::WalkIn(customer) => &customer.name,
        }
    }
}

/// Authenticated identity acting on a booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Customer(String),
    Admin(String),
}

impl Caller {
    pub fn name(&self) -> &str {
        match self {
            Caller::Customer(name) | Caller::Admin(name) => name,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin(_))
    }

    /// Admins act on any booking; customers only on their own.
    pub fn can_act_on(&self, owner: &BookingOwner) -> bool {
        match self {
            Caller::Admin(_) => true,
            Caller::Customer(name) => owner.username() == Some(name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub show_id: Uuid,
    pub owner: BookingOwner,
    pub seat_count: u32,
    pub amount: Decimal,
    pub status: BookingStatus,
    pub payment_type: PaymentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh booking waiting for payment
    pub fn pending(
        show_id: Uuid,
        owner: BookingOwner,
        seat_count: u32,
        amount: Decimal,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            show_id,
            owner,
            seat_count,
            amount,
            status: BookingStatus::Pending,
            payment_type,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SeatAssignment {
    pub booking_id: Uuid,
    pub show_id: Uuid,
    pub seat_number: String,
}

/// A booking together with its seat numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    pub booking: Booking,
    pub seats: Vec<String>,
}

/// What the caller gets back from a successful reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationHandle {
    pub booking_id: Uuid,
    pub show_id: Uuid,
    pub seats: Vec<String>,
    pub amount_due: Decimal,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
}
