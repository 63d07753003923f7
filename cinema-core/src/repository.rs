use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_shared::{
    Booking, BookingStatus, PaymentTransaction, ReservationHold, Show, Wallet, WalletTransaction,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::StoreError;

/// Read-only show reference data
#[async_trait]
pub trait ShowRepository: Send + Sync {
    async fn get_show(&self, id: Uuid) -> Result<Option<Show>, StoreError>;
}

/// Bookings and their seat assignments
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Inserts all seat rows or none. A seat already assigned on the show
    /// fails with `StoreError::UniqueViolation`.
    async fn insert_seats(
        &self,
        booking_id: Uuid,
        show_id: Uuid,
        seats: &[String],
    ) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Customer's bookings, newest first
    async fn list_by_customer(&self, username: &str) -> Result<Vec<Booking>, StoreError>;

    async fn seats_for_booking(&self, booking_id: Uuid) -> Result<Vec<String>, StoreError>;

    /// Subset of `seats` assigned on the show to a booking that occupies seats
    async fn taken_seats(&self, show_id: Uuid, seats: &[String]) -> Result<Vec<String>, StoreError>;

    /// Compare-and-set on status, stamping `updated_at` with `at`. `false`
    /// when the booking is gone or not in `from`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Deletes the booking with its seats and hold, only while it is Pending.
    async fn delete_pending(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Deletes a Pending booking together with its seats and hold in one
    /// atomic step, unless the hold carries a settlement lease active at `now`.
    async fn release_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<PendingRelease, StoreError>;
}

/// Result of releasing a Pending booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRelease {
    Released,
    /// A settlement holds the lease until the given instant; nothing was deleted
    Claimed(DateTime<Utc>),
    /// Gone, or no longer Pending
    NotPending,
}

/// Result of trying to reserve a hold for one settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldClaim {
    Claimed(ReservationHold),
    /// Another settlement holds an active lease
    Busy(ReservationHold),
    Expired(ReservationHold),
    Missing,
}

#[async_trait]
pub trait HoldRepository: Send + Sync {
    async fn insert_hold(&self, hold: &ReservationHold) -> Result<(), StoreError>;

    async fn get_hold(&self, booking_id: Uuid) -> Result<Option<ReservationHold>, StoreError>;

    /// Atomically marks an unexpired, unclaimed hold as claimed until `lease_until`.
    async fn claim_hold(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<HoldClaim, StoreError>;

    async fn release_claim(&self, booking_id: Uuid) -> Result<(), StoreError>;

    async fn remove_hold(&self, booking_id: Uuid) -> Result<bool, StoreError>;

    async fn list_holds(&self) -> Result<Vec<ReservationHold>, StoreError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn record_payment(&self, payment: &PaymentTransaction) -> Result<(), StoreError>;

    async fn payments_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceUpdate {
    /// Applied; the new balance
    Applied(Decimal),
    /// Would go below zero; nothing changed. Carries the current balance.
    Insufficient(Decimal),
    NoWallet,
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Creates an empty wallet, or returns the existing one.
    async fn create_wallet(&self, owner: &str, now: DateTime<Utc>) -> Result<Wallet, StoreError>;

    async fn get_wallet(&self, owner: &str) -> Result<Option<Wallet>, StoreError>;

    /// Adds `delta` (may be negative) in one atomic update, only if the
    /// resulting balance stays non-negative.
    async fn apply_delta(
        &self,
        owner: &str,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<BalanceUpdate, StoreError>;

    async fn append_transaction(&self, entry: &WalletTransaction) -> Result<(), StoreError>;

    /// Oldest first
    async fn transactions(&self, owner: &str) -> Result<Vec<WalletTransaction>, StoreError>;
}
