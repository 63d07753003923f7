//! Process-local store used by tests and local runs.
//!
//! Every operation takes a single lock over the whole state, so each trait
//! method is atomic the way the matching SQL statement is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinema_core::{
    BalanceUpdate, BookingRepository, HoldClaim, HoldRepository, PaymentRepository, PendingRelease, SeatLock,
    SeatLocker, ShowRepository, StoreError, WalletRepository,
};
use cinema_shared::{
    Booking, BookingStatus, PaymentTransaction, ReservationHold, Show, Wallet, WalletTransaction,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Default)]
struct State {
    shows: HashMap<Uuid, Show>,
    bookings: HashMap<Uuid, Booking>,
    booking_seats: HashMap<Uuid, Vec<String>>,
    // (show, seat) -> booking; mirrors the unique key on booking_seats
    seat_index: HashMap<(Uuid, String), Uuid>,
    holds: HashMap<Uuid, ReservationHold>,
    payments: Vec<PaymentTransaction>,
    wallets: HashMap<String, Wallet>,
    wallet_transactions: Vec<WalletTransaction>,
}

impl State {
    fn drop_booking(&mut self, id: Uuid) {
        if let Some(booking) = self.bookings.remove(&id) {
            for seat in self.booking_seats.remove(&id).unwrap_or_default() {
                self.seat_index.remove(&(booking.show_id, seat));
            }
        }
        self.holds.remove(&id);
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    offline: AtomicBool,
    failing: Mutex<HashSet<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `StoreError::Unavailable` while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make one named operation (e.g. `"insert_seats"`) fail until cleared.
    pub fn fail_operation(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    pub fn insert_show(&self, show: Show) {
        lock(&self.state).shows.insert(show.id, show);
    }

    pub fn booking_count(&self) -> usize {
        lock(&self.state).bookings.len()
    }

    pub fn hold_count(&self) -> usize {
        lock(&self.state).holds.len()
    }

    /// Seat rows stored for a show, sorted
    pub fn seat_rows(&self, show_id: Uuid) -> Vec<String> {
        let state = lock(&self.state);
        let mut seats: Vec<String> = state
            .seat_index
            .keys()
            .filter(|(show, _)| *show == show_id)
            .map(|(_, seat)| seat.clone())
            .collect();
        seats.sort();
        seats
    }

    pub fn payment_count(&self) -> usize {
        lock(&self.state).payments.len()
    }

    fn check(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        if lock(&self.failing).contains(operation) {
            return Err(StoreError::Unavailable(format!("{} failed", operation)));
        }
        Ok(lock(&self.state))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ShowRepository for InMemoryStore {
    async fn get_show(&self, id: Uuid) -> Result<Option<Show>, StoreError> {
        Ok(self.check("get_show")?.shows.get(&id).cloned())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut state = self.check("insert_booking")?;
        if state.bookings.contains_key(&booking.id) {
            return Err(StoreError::UniqueViolation(format!("booking {}", booking.id)));
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn insert_seats(
        &self,
        booking_id: Uuid,
        show_id: Uuid,
        seats: &[String],
    ) -> Result<(), StoreError> {
        let mut state = self.check("insert_seats")?;
        if !state.bookings.contains_key(&booking_id) {
            return Err(StoreError::NotFound(format!("booking {}", booking_id)));
        }

        let mut batch = HashSet::new();
        for seat in seats {
            if state.seat_index.contains_key(&(show_id, seat.clone())) || !batch.insert(seat) {
                return Err(StoreError::UniqueViolation(format!("seat {} on show {}", seat, show_id)));
            }
        }

        for seat in seats {
            state.seat_index.insert((show_id, seat.clone()), booking_id);
        }
        state
            .booking_seats
            .entry(booking_id)
            .or_default()
            .extend(seats.iter().cloned());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.check("get_booking")?.bookings.get(&id).cloned())
    }

    async fn list_by_customer(&self, username: &str) -> Result<Vec<Booking>, StoreError> {
        let state = self.check("list_by_customer")?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.owner.username() == Some(username))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn seats_for_booking(&self, booking_id: Uuid) -> Result<Vec<String>, StoreError> {
        let state = self.check("seats_for_booking")?;
        Ok(state.booking_seats.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn taken_seats(&self, show_id: Uuid, seats: &[String]) -> Result<Vec<String>, StoreError> {
        let state = self.check("taken_seats")?;
        Ok(seats
            .iter()
            .filter(|seat| {
                state
                    .seat_index
                    .get(&(show_id, (*seat).clone()))
                    .and_then(|booking_id| state.bookings.get(booking_id))
                    .is_some_and(|booking| booking.status.occupies_seats())
            })
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.check("transition_status")?;
        match state.bookings.get_mut(&id) {
            Some(booking) if booking.status == from => {
                booking.status = to;
                booking.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.check("delete_pending")?;
        let pending = state.bookings.get(&id).is_some_and(|b| b.is_pending());
        if pending {
            state.drop_booking(id);
        }
        Ok(pending)
    }

    async fn release_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<PendingRelease, StoreError> {
        let mut state = self.check("release_pending")?;
        if let Some(until) = state.holds.get(&id).and_then(|hold| hold.active_claim(now)) {
            return Ok(PendingRelease::Claimed(until));
        }
        if !state.bookings.get(&id).is_some_and(|b| b.is_pending()) {
            return Ok(PendingRelease::NotPending);
        }
        state.drop_booking(id);
        Ok(PendingRelease::Released)
    }
}

#[async_trait]
impl HoldRepository for InMemoryStore {
    async fn insert_hold(&self, hold: &ReservationHold) -> Result<(), StoreError> {
        let mut state = self.check("insert_hold")?;
        if !state.bookings.contains_key(&hold.booking_id) {
            return Err(StoreError::NotFound(format!("booking {}", hold.booking_id)));
        }
        if state.holds.contains_key(&hold.booking_id) {
            return Err(StoreError::UniqueViolation(format!("hold {}", hold.booking_id)));
        }
        state.holds.insert(hold.booking_id, hold.clone());
        Ok(())
    }

    async fn get_hold(&self, booking_id: Uuid) -> Result<Option<ReservationHold>, StoreError> {
        Ok(self.check("get_hold")?.holds.get(&booking_id).cloned())
    }

    async fn claim_hold(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<HoldClaim, StoreError> {
        let mut state = self.check("claim_hold")?;
        let Some(hold) = state.holds.get_mut(&booking_id) else {
            return Ok(HoldClaim::Missing);
        };
        if hold.active_claim(now).is_some() {
            return Ok(HoldClaim::Busy(hold.clone()));
        }
        if hold.is_expired(now) {
            return Ok(HoldClaim::Expired(hold.clone()));
        }
        hold.claimed_until = Some(lease_until);
        Ok(HoldClaim::Claimed(hold.clone()))
    }

    async fn release_claim(&self, booking_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.check("release_claim")?;
        if let Some(hold) = state.holds.get_mut(&booking_id) {
            hold.claimed_until = None;
        }
        Ok(())
    }

    async fn remove_hold(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.check("remove_hold")?.holds.remove(&booking_id).is_some())
    }

    async fn list_holds(&self) -> Result<Vec<ReservationHold>, StoreError> {
        let state = self.check("list_holds")?;
        let mut holds: Vec<ReservationHold> = state.holds.values().cloned().collect();
        holds.sort_by_key(|h| h.expires_at);
        Ok(holds)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn record_payment(&self, payment: &PaymentTransaction) -> Result<(), StoreError> {
        let mut state = self.check("record_payment")?;
        if state.payments.iter().any(|p| p.booking_id == payment.booking_id) {
            return Err(StoreError::UniqueViolation(format!(
                "payment for booking {}",
                payment.booking_id
            )));
        }
        state.payments.push(payment.clone());
        Ok(())
    }

    async fn payments_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let state = self.check("payments_for_booking")?;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WalletRepository for InMemoryStore {
    async fn create_wallet(&self, owner: &str, now: DateTime<Utc>) -> Result<Wallet, StoreError> {
        let mut state = self.check("create_wallet")?;
        let wallet = state
            .wallets
            .entry(owner.to_string())
            .or_insert_with(|| Wallet {
                owner: owner.to_string(),
                balance: Decimal::ZERO,
                updated_at: now,
            });
        Ok(wallet.clone())
    }

    async fn get_wallet(&self, owner: &str) -> Result<Option<Wallet>, StoreError> {
        Ok(self.check("get_wallet")?.wallets.get(owner).cloned())
    }

    async fn apply_delta(
        &self,
        owner: &str,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<BalanceUpdate, StoreError> {
        let mut state = self.check("apply_delta")?;
        let Some(wallet) = state.wallets.get_mut(owner) else {
            return Ok(BalanceUpdate::NoWallet);
        };
        if wallet.balance + delta < Decimal::ZERO {
            return Ok(BalanceUpdate::Insufficient(wallet.balance));
        }
        wallet.balance += delta;
        wallet.updated_at = now;
        Ok(BalanceUpdate::Applied(wallet.balance))
    }

    async fn append_transaction(&self, entry: &WalletTransaction) -> Result<(), StoreError> {
        self.check("append_transaction")?
            .wallet_transactions
            .push(entry.clone());
        Ok(())
    }

    async fn transactions(&self, owner: &str) -> Result<Vec<WalletTransaction>, StoreError> {
        let state = self.check("transactions")?;
        Ok(state
            .wallet_transactions
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }
}

/// Seat locks held in process memory, with the same expiry semantics as Redis
#[derive(Default)]
pub struct InMemorySeatLocker {
    locks: Mutex<HashMap<(Uuid, String), (String, Instant)>>,
}

impl InMemorySeatLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self, show_id: Uuid) -> usize {
        let now = Instant::now();
        lock(&self.locks)
            .iter()
            .filter(|((show, _), (_, expires))| *show == show_id && *expires > now)
            .count()
    }
}

#[async_trait]
impl SeatLocker for InMemorySeatLocker {
    async fn try_lock(
        &self,
        show_id: Uuid,
        seats: &[String],
        token: &str,
        ttl: Duration,
    ) -> Result<SeatLock, StoreError> {
        let now = Instant::now();
        let mut locks = lock(&self.locks);
        locks.retain(|_, (_, expires)| *expires > now);

        let contended: Vec<String> = seats
            .iter()
            .filter(|seat| {
                locks
                    .get(&(show_id, (*seat).clone()))
                    .is_some_and(|(holder, _)| holder != token)
            })
            .cloned()
            .collect();
        if !contended.is_empty() {
            return Ok(SeatLock::Contended(contended));
        }

        for seat in seats {
            locks.insert((show_id, seat.clone()), (token.to_string(), now + ttl));
        }
        Ok(SeatLock::Acquired)
    }

    async fn unlock(&self, show_id: Uuid, seats: &[String], token: &str) -> Result<(), StoreError> {
        let mut locks = lock(&self.locks);
        for seat in seats {
            let key = (show_id, seat.clone());
            if locks.get(&key).is_some_and(|(holder, _)| holder == token) {
                locks.remove(&key);
            }
        }
        Ok(())
    }
}
