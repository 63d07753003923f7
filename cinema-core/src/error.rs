use cinema_shared::BookingStatus;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::payment::GatewayError;

/// Coarse category of a failure, what a transport layer maps to a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Authorization,
    Expired,
    ExternalService,
    DataAccess,
}

/// Failure reported by a repository or another storage-backed collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Seat count {requested} outside allowed range 1..={max}")]
    InvalidSeatCount { requested: usize, max: usize },

    #[error("Invalid seat number: {0:?}")]
    InvalidSeatNumber(String),

    #[error("Seat requested more than once: {0}")]
    DuplicateSeat(String),

    #[error("Show {0} has already started")]
    ShowAlreadyStarted(Uuid),

    #[error("Show {0} has already ended")]
    ShowEnded(Uuid),

    #[error("Seats unavailable: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),

    #[error("Amount mismatch: expected {expected}, supplied {supplied}")]
    AmountMismatch { expected: Decimal, supplied: Decimal },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Booking {booking_id} is {actual}, expected {expected}")]
    InvalidStatus {
        booking_id: Uuid,
        actual: BookingStatus,
        expected: BookingStatus,
    },

    #[error("Settlement already in progress for booking {0}")]
    SettlementInProgress(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Show not found: {0}")]
    ShowNotFound(Uuid),

    #[error("Wallet not found for {0}")]
    WalletNotFound(String),

    #[error("{caller} is not the owner of booking {booking_id}")]
    NotOwner { booking_id: Uuid, caller: String },

    #[error("Cash settlement not allowed for booking {0}")]
    CashNotAllowed(Uuid),

    #[error("Reservation {0} has expired")]
    ReservationExpired(Uuid),

    #[error("Payment failed: {0}")]
    PaymentFailed(#[from] GatewayError),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("Expiration scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("Data access error: {0}")]
    DataAccess(#[from] StoreError),
}

impl BookingError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidSeatCount { .. } => "INVALID_SEAT_COUNT",
            BookingError::InvalidSeatNumber(_) => "INVALID_SEAT_NUMBER",
            BookingError::DuplicateSeat(_) => "DUPLICATE_SEAT",
            BookingError::ShowAlreadyStarted(_) => "SHOW_ALREADY_STARTED",
            BookingError::ShowEnded(_) => "SHOW_ENDED",
            BookingError::SeatsUnavailable(_) => "SEATS_UNAVAILABLE",
            BookingError::AmountMismatch { .. } | BookingError::NonPositiveAmount(_) => {
                "INVALID_AMOUNT"
            }
            BookingError::InvalidStatus { .. } => "INVALID_BOOKING_STATUS",
            BookingError::SettlementInProgress(_) => "SETTLEMENT_IN_PROGRESS",
            BookingError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            BookingError::ShowNotFound(_) => "SHOW_NOT_FOUND",
            BookingError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            BookingError::NotOwner { .. } => "NOT_BOOKING_OWNER",
            BookingError::CashNotAllowed(_) => "CASH_NOT_ALLOWED",
            BookingError::ReservationExpired(_) => "RESERVATION_EXPIRED",
            BookingError::PaymentFailed(_) => "PAYMENT_FAILED",
            BookingError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            BookingError::SchedulerUnavailable(_) => "SCHEDULER_UNAVAILABLE",
            BookingError::DataAccess(_) => "DATA_ACCESS_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::InvalidSeatCount { .. }
            | BookingError::InvalidSeatNumber(_)
            | BookingError::DuplicateSeat(_)
            | BookingError::ShowAlreadyStarted(_)
            | BookingError::NonPositiveAmount(_) => ErrorKind::Validation,
            BookingError::SeatsUnavailable(_)
            | BookingError::AmountMismatch { .. }
            | BookingError::InvalidStatus { .. }
            | BookingError::SettlementInProgress(_)
            | BookingError::ShowEnded(_) => ErrorKind::Conflict,
            BookingError::BookingNotFound(_)
            | BookingError::ShowNotFound(_)
            | BookingError::WalletNotFound(_) => ErrorKind::NotFound,
            BookingError::NotOwner { .. } | BookingError::CashNotAllowed(_) => {
                ErrorKind::Authorization
            }
            BookingError::ReservationExpired(_) => ErrorKind::Expired,
            BookingError::PaymentFailed(_) | BookingError::InsufficientFunds { .. } => {
                ErrorKind::ExternalService
            }
            BookingError::SchedulerUnavailable(_) | BookingError::DataAccess(_) => {
                ErrorKind::DataAccess
            }
        }
    }

    /// Message safe to show to an end user. Internal failures are not echoed.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::DataAccess => "Internal error, please retry later".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, BookingError>;
