//! Pending -> Confirmed settlement.
//!
//! The hold is claimed before any money moves, so concurrent confirmations
//! and the expiration supervisor cannot both act on one booking. Once the
//! charge succeeds nothing is rolled back: later failures are logged for
//! reconciliation and the receipt is still returned.

use chrono::{DateTime, Utc};
use cinema_core::{BookingError, CoreResult, HoldClaim, PendingRelease};
use cinema_shared::{
    Booking, BookingEvent, BookingStatus, CardDetails, Caller, PaymentMethod, PaymentTransaction,
    PaymentType, Receipt, ReleaseReason, Show,
};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::manager::require_status;
use crate::rules::BookingRules;
use crate::service::CoreDeps;
use crate::supervisor::ExpirationSupervisor;
use crate::wallet::WalletLedger;

pub struct SettlementOrchestrator {
    deps: CoreDeps,
    wallet: WalletLedger,
    supervisor: ExpirationSupervisor,
    rules: BookingRules,
}

impl SettlementOrchestrator {
    pub fn new(
        deps: CoreDeps,
        wallet: WalletLedger,
        supervisor: ExpirationSupervisor,
        rules: BookingRules,
    ) -> Self {
        Self {
            deps,
            wallet,
            supervisor,
            rules,
        }
    }

    pub async fn confirm_reservation(
        &self,
        booking_id: Uuid,
        caller: &Caller,
        method: PaymentMethod,
    ) -> CoreResult<Receipt> {
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
        require_status(&booking, BookingStatus::Pending)?;
        if matches!(method, PaymentMethod::Cash)
            && !(booking.payment_type == PaymentType::Cash && caller.is_admin())
        {
            return Err(BookingError::CashNotAllowed(booking_id));
        }

        let now = self.deps.clock.now();
        match self
            .deps
            .holds
            .claim_hold(booking_id, now, now + self.rules.settlement_lease)
            .await?
        {
            HoldClaim::Claimed(_) => {}
            HoldClaim::Busy(_) => return Err(BookingError::SettlementInProgress(booking_id)),
            HoldClaim::Expired(_) => {
                self.lazy_cleanup(booking_id, now).await;
                return Err(BookingError::ReservationExpired(booking_id));
            }
            HoldClaim::Missing => return Err(self.missing_hold(booking_id, now).await),
        }

        let show = match self.deps.shows.get_show(booking.show_id).await {
            Ok(Some(show)) => show,
            Ok(None) => {
                self.abandon(booking_id).await;
                return Err(BookingError::ShowNotFound(booking.show_id));
            }
            Err(e) => {
                self.abandon(booking_id).await;
                return Err(e.into());
            }
        };

        let kind = method.kind();
        let transaction_id = match self.charge(&booking, method).await {
            Ok(transaction_id) => transaction_id,
            Err(e) => {
                warn!(booking_id = %booking_id, code = e.code(), "Charge failed, booking stays Pending");
                self.abandon(booking_id).await;
                return Err(e);
            }
        };

        let processed_at = self.deps.clock.now();
        let payment = PaymentTransaction {
            id: Uuid::new_v4(),
            booking_id,
            transaction_id: transaction_id.clone(),
            amount: booking.amount,
            method: kind,
            processed_at,
        };
        let seats = self.finalize(&booking, &payment).await;

        info!(
            booking_id = %booking_id,
            transaction_id = %transaction_id,
            amount = %booking.amount,
            method = kind.as_str(),
            "Booking confirmed"
        );
        Ok(receipt(&booking, &show, payment, seats))
    }

    async fn charge(&self, booking: &Booking, method: PaymentMethod) -> CoreResult<String> {
        match method {
            PaymentMethod::Card(card) => Ok(self.deps.gateway.charge(&card, booking.amount).await?),
            PaymentMethod::Wallet => {
                let owner = booking
                    .owner
                    .username()
                    .ok_or_else(|| BookingError::WalletNotFound(booking.owner.display_name().to_string()))?;
                let entry = self
                    .wallet
                    .deduct_from_balance(owner, booking.amount, Some(booking.id))
                    .await?;
                Ok(entry.transaction_id)
            }
            PaymentMethod::Cash => Ok(format!("cash_{}", Uuid::new_v4().simple())),
        }
    }

    /// Post-charge bookkeeping. Every failure here is logged, never returned.
    async fn finalize(&self, booking: &Booking, payment: &PaymentTransaction) -> Vec<String> {
        let booking_id = booking.id;

        if let Err(e) = self.deps.payments.record_payment(payment).await {
            error!(
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                error = %e,
                "Charge succeeded but payment record failed; reconcile manually"
            );
        }

        match self
            .deps
            .bookings
            .transition_status(booking_id, BookingStatus::Pending, BookingStatus::Confirmed, payment.processed_at)
            .await
        {
            Ok(true) => {}
            Ok(false) => error!(
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                "Charge succeeded but booking was no longer Pending; reconcile manually"
            ),
            Err(e) => error!(
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                error = %e,
                "Charge succeeded but booking status update failed; reconcile manually"
            ),
        }

        if let Err(e) = self.deps.holds.remove_hold(booking_id).await {
            error!(booking_id = %booking_id, error = %e, "Failed to remove hold after confirmation");
        }
        self.supervisor.cancel(booking_id);

        let seats = match self.deps.bookings.seats_for_booking(booking_id).await {
            Ok(seats) => seats,
            Err(e) => {
                error!(booking_id = %booking_id, error = %e, "Failed to load seats for receipt");
                Vec::new()
            }
        };

        self.publish(BookingEvent::BookingConfirmed {
            booking_id,
            transaction_id: payment.transaction_id.clone(),
            amount: payment.amount,
            method: payment.method,
            timestamp: payment.processed_at.timestamp(),
        })
        .await;
        seats
    }

    /// Charge a card and credit the caller's wallet with the same amount.
    ///
    /// A wallet failure after the charge is not refunded: it is logged with the
    /// gateway transaction id and surfaced.
    pub async fn add_wallet_funds(
        &self,
        owner: &str,
        amount: Decimal,
        card: &CardDetails,
    ) -> CoreResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(BookingError::NonPositiveAmount(amount));
        }
        if self.deps.wallets.get_wallet(owner).await?.is_none() {
            return Err(BookingError::WalletNotFound(owner.to_string()));
        }

        let transaction_id = self.deps.gateway.charge(card, amount).await?;

        let entry = match self
            .wallet
            .add_to_balance(owner, amount, transaction_id.clone())
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                error!(
                    owner,
                    transaction_id = %transaction_id,
                    amount = %amount,
                    error = %e,
                    "Card charged but wallet credit failed; refund manually"
                );
                return Err(e);
            }
        };

        self.publish(BookingEvent::WalletFunded {
            owner: owner.to_string(),
            amount,
            balance: entry.balance_after,
            transaction_id,
            timestamp: entry.created_at.timestamp(),
        })
        .await;
        Ok(entry.balance_after)
    }

    /// Hold already gone: either released, or settled by someone else
    async fn missing_hold(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingError {
        match self.deps.bookings.get_booking(booking_id).await {
            Ok(Some(current)) if current.is_pending() => {
                // Pending without a hold is past its window
                self.lazy_cleanup(booking_id, now).await;
                BookingError::ReservationExpired(booking_id)
            }
            Ok(Some(current)) => BookingError::InvalidStatus {
                booking_id,
                actual: current.status,
                expected: BookingStatus::Pending,
            },
            Ok(None) => BookingError::ReservationExpired(booking_id),
            Err(e) => e.into(),
        }
    }

    /// Delete an expired booking found on access, ahead of the supervisor
    async fn lazy_cleanup(&self, booking_id: Uuid, now: DateTime<Utc>) {
        match self.deps.bookings.release_pending(booking_id, now).await {
            Ok(PendingRelease::Released) => {
                self.supervisor.cancel(booking_id);
                warn!(booking_id = %booking_id, "Expired reservation removed on access");
                self.publish(BookingEvent::ReservationReleased {
                    booking_id,
                    reason: ReleaseReason::LazyCleanup,
                    timestamp: now.timestamp(),
                })
                .await;
            }
            Ok(_) => {}
            // Booking and hold are intact for the supervisor
            Err(e) => warn!(booking_id = %booking_id, error = %e, "Lazy cleanup could not release booking"),
        }
    }

    /// Give the hold back after a failed attempt, still inside its window
    async fn abandon(&self, booking_id: Uuid) {
        if let Err(e) = self.deps.holds.release_claim(booking_id).await {
            // Lease lapses on its own
            warn!(booking_id = %booking_id, error = %e, "Failed to release settlement claim");
        }
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.deps.events.publish(&event).await {
            warn!(topic = event.topic(), error = %e, "Failed to publish event");
        }
    }
}

fn receipt(booking: &Booking, show: &Show, payment: PaymentTransaction, seats: Vec<String>) -> Receipt {
    Receipt {
        booking_id: booking.id,
        transaction_id: payment.transaction_id,
        movie_title: show.movie_title.clone(),
        show_starts_at: show.starts_at,
        seats,
        amount: payment.amount,
        method: payment.method,
        processed_at: payment.processed_at,
    }
}
