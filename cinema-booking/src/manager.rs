use chrono::{DateTime, Utc};
use cinema_catalog::{PricingConfig, PricingEngine, SeatInventory};
use cinema_core::{BookingError, CoreResult, PendingRelease, SeatLock, StoreError};
use cinema_shared::{
    Booking, BookingDetails, BookingEvent, BookingOwner, BookingStatus, Caller, PaymentType,
    ReleaseReason, ReservationHandle, ReservationHold, Show, WalkInCustomer,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compensation::Compensations;
use crate::rules::BookingRules;
use crate::service::CoreDeps;
use crate::supervisor::ExpirationSupervisor;

/// Who is reserving, which decides owner shape and payment type
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ReservationOrigin {
    /// Registered customer, settles by card or wallet
    SelfService { username: String },
    /// Walk-in at the counter, settled in cash by staff. `amount_paid` must
    /// match the computed total exactly.
    Counter {
        customer: WalkInCustomer,
        amount_paid: Decimal,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub show_id: Uuid,
    pub seats: Vec<String>,
    #[serde(flatten)]
    pub origin: ReservationOrigin,
}

/// Booking state machine: creation, cancellation, check-in and reads
pub struct ReservationManager {
    deps: CoreDeps,
    inventory: SeatInventory,
    pricing: PricingEngine,
    supervisor: ExpirationSupervisor,
    rules: BookingRules,
}

impl ReservationManager {
    pub fn new(deps: CoreDeps, rules: BookingRules, supervisor: ExpirationSupervisor) -> Self {
        let inventory = SeatInventory::new(deps.bookings.clone(), rules.max_seats_per_booking);
        let pricing = PricingEngine::new(PricingConfig {
            premium_surcharge: rules.premium_surcharge,
        });
        Self {
            deps,
            inventory,
            pricing,
            supervisor,
            rules,
        }
    }

    pub async fn create_reservation(&self, request: ReservationRequest) -> CoreResult<ReservationHandle> {
        let seats = self.inventory.normalize_seats(&request.seats)?;
        let now = self.deps.clock.now();

        let show = self
            .deps
            .shows
            .get_show(request.show_id)
            .await?
            .ok_or(BookingError::ShowNotFound(request.show_id))?;
        if show.has_started(now) {
            return Err(BookingError::ShowAlreadyStarted(show.id));
        }

        let token = Uuid::new_v4().to_string();
        match self
            .deps
            .locks
            .try_lock(show.id, &seats, &token, self.rules.seat_lock_ttl)
            .await?
        {
            SeatLock::Acquired => {}
            SeatLock::Contended(busy) => {
                warn!(show_id = %show.id, seats = ?busy, "Seats locked by a concurrent request");
                return Err(BookingError::SeatsUnavailable(busy));
            }
        }

        let result = self.create_locked(&show, &seats, request.origin, now).await;

        if let Err(e) = self.deps.locks.unlock(show.id, &seats, &token).await {
            warn!(show_id = %show.id, error = %e, "Failed to release seat locks; they will expire");
        }
        result
    }

    async fn create_locked(
        &self,
        show: &Show,
        seats: &[String],
        origin: ReservationOrigin,
        now: DateTime<Utc>,
    ) -> CoreResult<ReservationHandle> {
        self.inventory.ensure_available(show.id, seats).await?;

        let quote = self.pricing.quote(show, seats);
        let (owner, payment_type) = match origin {
            ReservationOrigin::SelfService { username } => {
                (BookingOwner::customer(username), PaymentType::Card)
            }
            ReservationOrigin::Counter {
                customer,
                amount_paid,
            } => {
                self.pricing.verify_amount(&quote, amount_paid)?;
                (BookingOwner::WalkIn(customer), PaymentType::Cash)
            }
        };

        let booking = Booking::pending(
            show.id,
            owner,
            seats.len() as u32,
            quote.total,
            payment_type,
            now,
        );
        self.deps.bookings.insert_booking(&booking).await?;

        let mut undo = Compensations::new();
        {
            let bookings = self.deps.bookings.clone();
            let id = booking.id;
            undo.push("delete booking", async move { bookings.delete_pending(id).await.map(|_| ()) });
        }

        let inserted = self.deps.bookings.insert_seats(booking.id, show.id, seats).await;
        if let Err(StoreError::UniqueViolation(detail)) = &inserted {
            warn!(booking_id = %booking.id, detail = %detail, "Seat assignment conflict");
            undo.unwind().await;
            return Err(BookingError::SeatsUnavailable(self.conflicting_seats(show.id, seats).await));
        }
        undo.check(inserted).await?;

        let expires_at = now + self.rules.hold_duration;
        undo.check(
            self.deps
                .holds
                .insert_hold(&ReservationHold::new(booking.id, expires_at))
                .await,
        )
        .await?;
        {
            let holds = self.deps.holds.clone();
            let id = booking.id;
            undo.push("remove hold", async move { holds.remove_hold(id).await.map(|_| ()) });
        }

        undo.check(self.supervisor.schedule(booking.id, expires_at)).await?;
        undo.disarm();

        info!(
            booking_id = %booking.id,
            show_id = %show.id,
            seats = ?seats,
            amount = %booking.amount,
            expires_at = %expires_at,
            "Reservation created"
        );
        self.publish(BookingEvent::ReservationCreated {
            booking_id: booking.id,
            show_id: show.id,
            seats: seats.to_vec(),
            amount_due: booking.amount,
            expires_at: expires_at.timestamp(),
            timestamp: now.timestamp(),
        })
        .await;

        Ok(ReservationHandle {
            booking_id: booking.id,
            show_id: show.id,
            seats: seats.to_vec(),
            amount_due: booking.amount,
            status: booking.status,
            expires_at,
        })
    }

    /// Seats another booking got first; all requested seats if that cannot be told
    async fn conflicting_seats(&self, show_id: Uuid, seats: &[String]) -> Vec<String> {
        match self.inventory.check_availability(show_id, seats).await {
            Ok(availability) if !availability.is_available() => availability.taken,
            _ => seats.to_vec(),
        }
    }

    pub async fn get_reservation(&self, booking_id: Uuid, caller: &Caller) -> CoreResult<BookingDetails> {
        let booking = self.owned_booking(booking_id, caller).await?;
        let seats = self.deps.bookings.seats_for_booking(booking_id).await?;
        Ok(BookingDetails { booking, seats })
    }

    /// A customer's bookings, newest first
    pub async fn list_reservations(&self, username: &str) -> CoreResult<Vec<BookingDetails>> {
        let bookings = self.deps.bookings.list_by_customer(username).await?;
        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let seats = self.deps.bookings.seats_for_booking(booking.id).await?;
            details.push(BookingDetails { booking, seats });
        }
        Ok(details)
    }

    /// Only a Pending booking can be cancelled; it is deleted with its seats.
    pub async fn cancel_reservation(&self, booking_id: Uuid, caller: &Caller) -> CoreResult<()> {
        let booking = self.owned_booking(booking_id, caller).await?;
        require_status(&booking, BookingStatus::Pending)?;

        let now = self.deps.clock.now();
        match self.deps.bookings.release_pending(booking_id, now).await? {
            PendingRelease::Released => {}
            PendingRelease::Claimed(_) => return Err(BookingError::SettlementInProgress(booking_id)),
            PendingRelease::NotPending => {
                // Lost a race with settlement or expiry
                return match self.deps.bookings.get_booking(booking_id).await? {
                    Some(current) => Err(BookingError::InvalidStatus {
                        booking_id,
                        actual: current.status,
                        expected: BookingStatus::Pending,
                    }),
                    None => Err(BookingError::BookingNotFound(booking_id)),
                };
            }
        }
        self.supervisor.cancel(booking_id);

        info!(booking_id = %booking_id, caller = caller.name(), "Reservation cancelled");
        self.publish(BookingEvent::ReservationReleased {
            booking_id,
            reason: ReleaseReason::Cancelled,
            timestamp: now.timestamp(),
        })
        .await;
        Ok(())
    }

    /// Admit a Confirmed booking, only before its show ends.
    pub async fn check_in(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let mut booking = self
            .deps
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        require_status(&booking, BookingStatus::Confirmed)?;

        let now = self.deps.clock.now();
        let show = self
            .deps
            .shows
            .get_show(booking.show_id)
            .await?
            .ok_or(BookingError::ShowNotFound(booking.show_id))?;
        if show.has_ended(now) {
            return Err(BookingError::ShowEnded(show.id));
        }

        if !self
            .deps
            .bookings
            .transition_status(booking_id, BookingStatus::Confirmed, BookingStatus::CheckedIn, now)
            .await?
        {
            let actual = self
                .deps
                .bookings
                .get_booking(booking_id)
                .await?
                .map(|b| b.status)
                .ok_or(BookingError::BookingNotFound(booking_id))?;
            return Err(BookingError::InvalidStatus {
                booking_id,
                actual,
                expected: BookingStatus::Confirmed,
            });
        }

        booking.status = BookingStatus::CheckedIn;
        booking.updated_at = now;
        info!(booking_id = %booking_id, "Booking checked in");
        self.publish(BookingEvent::BookingCheckedIn {
            booking_id,
            timestamp: now.timestamp(),
        })
        .await;
        Ok(booking)
    }

    async fn owned_booking(&self, booking_id: Uuid, caller: &Caller) -> CoreResult<Booking> {
        let booking = self
            .deps
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        if !caller.can_act_on(&booking.owner) {
            return Err(BookingError::NotOwner {
                booking_id,
                caller: caller.name().to_string(),
            });
        }
        Ok(booking)
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.deps.events.publish(&event).await {
            warn!(topic = event.topic(), error = %e, "Failed to publish event");
        }
    }
}

pub(crate) fn require_status(booking: &Booking, expected: BookingStatus) -> CoreResult<()> {
    if booking.status == expected {
        Ok(())
    } else {
        Err(BookingError::InvalidStatus {
            booking_id: booking.id,
            actual: booking.status,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_both_origins() {
        let show_id = Uuid::new_v4();
        let online: ReservationRequest = serde_json::from_value(serde_json::json!({
            "show_id": show_id,
            "seats": ["A1", "A2"],
            "origin": "self_service",
            "username": "alice"
        }))
        .unwrap();
        assert!(matches!(online.origin, ReservationOrigin::SelfService { ref username } if username == "alice"));

        let counter: ReservationRequest = serde_json::from_value(serde_json::json!({
            "show_id": show_id,
            "seats": ["C5"],
            "origin": "counter",
            "customer": { "name": "Bob", "phone": "555-0101", "email": null },
            "amount_paid": "250.00"
        }))
        .unwrap();
        assert!(matches!(counter.origin, ReservationOrigin::Counter { .. }));
    }
}
