use cinema_core::{
    BookingRepository, Clock, CoreResult, EventPublisher, HoldRepository, PaymentGateway,
    PaymentRepository, SeatLocker, ShowRepository, WalletRepository,
};
use cinema_shared::{
    Booking, BookingDetails, CardDetails, Caller, PaymentMethod, Receipt, ReservationHandle,
    Wallet, WalletTransaction,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::manager::{ReservationManager, ReservationRequest};
use crate::orchestrator::SettlementOrchestrator;
use crate::rules::BookingRules;
use crate::supervisor::{ExpirationSupervisor, RecoveryReport};
use crate::wallet::WalletLedger;

/// Collaborators the core runs against, built once by the host and injected
#[derive(Clone)]
pub struct CoreDeps {
    pub shows: Arc<dyn ShowRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub holds: Arc<dyn HoldRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub locks: Arc<dyn SeatLocker>,
    pub events: Arc<dyn EventPublisher>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
}

/// Entry point for hosts: reservation, settlement, wallet and expiry
pub struct CinemaCore {
    manager: ReservationManager,
    orchestrator: SettlementOrchestrator,
    wallet: WalletLedger,
    supervisor: ExpirationSupervisor,
}

impl CinemaCore {
    pub fn new(deps: CoreDeps, rules: BookingRules) -> Self {
        let supervisor = ExpirationSupervisor::new(
            deps.bookings.clone(),
            deps.holds.clone(),
            deps.events.clone(),
            deps.clock.clone(),
        );
        let wallet = WalletLedger::new(deps.wallets.clone(), deps.clock.clone());
        let manager = ReservationManager::new(deps.clone(), rules.clone(), supervisor.clone());
        let orchestrator =
            SettlementOrchestrator::new(deps, wallet.clone(), supervisor.clone(), rules);

        Self {
            manager,
            orchestrator,
            wallet,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &ExpirationSupervisor {
        &self.supervisor
    }

    pub async fn create_reservation(&self, request: ReservationRequest) -> CoreResult<ReservationHandle> {
        self.manager.create_reservation(request).await
    }

    pub async fn confirm_reservation(
        &self,
        booking_id: Uuid,
        caller: &Caller,
        payment: PaymentMethod,
    ) -> CoreResult<Receipt> {
        self.orchestrator
            .confirm_reservation(booking_id, caller, payment)
            .await
    }

    pub async fn cancel_reservation(&self, booking_id: Uuid, caller: &Caller) -> CoreResult<()> {
        self.manager.cancel_reservation(booking_id, caller).await
    }

    pub async fn get_reservation(&self, booking_id: Uuid, caller: &Caller) -> CoreResult<BookingDetails> {
        self.manager.get_reservation(booking_id, caller).await
    }

    pub async fn list_reservations(&self, username: &str) -> CoreResult<Vec<BookingDetails>> {
        self.manager.list_reservations(username).await
    }

    pub async fn check_in(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.manager.check_in(booking_id).await
    }

    pub async fn open_wallet(&self, owner: &str) -> CoreResult<Wallet> {
        self.wallet.open_wallet(owner).await
    }

    pub async fn wallet_balance(&self, owner: &str) -> CoreResult<Decimal> {
        self.wallet.balance(owner).await
    }

    pub async fn wallet_history(&self, owner: &str) -> CoreResult<Vec<WalletTransaction>> {
        self.wallet.history(owner).await
    }

    pub async fn add_wallet_funds(
        &self,
        owner: &str,
        amount: Decimal,
        card: &CardDetails,
    ) -> CoreResult<Decimal> {
        self.orchestrator.add_wallet_funds(owner, amount, card).await
    }

    pub async fn recover(&self) -> CoreResult<RecoveryReport> {
        self.supervisor.recover().await
    }

    pub async fn sweep(&self) -> CoreResult<usize> {
        self.supervisor.sweep().await
    }

    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }
}
