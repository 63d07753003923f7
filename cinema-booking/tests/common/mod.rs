#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration;
use cinema_booking::{
    BookingRules, CinemaCore, CoreDeps, MockPaymentGateway, ReservationOrigin, ReservationRequest,
};
use cinema_core::{Clock, ManualClock, SeatLock, SeatLocker, StoreError};
use cinema_shared::{Caller, CardDetails, ReservationHandle, Show, WalkInCustomer};
use cinema_store::{InMemorySeatLocker, InMemoryStore, RecordingEventPublisher};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub core: Arc<CinemaCore>,
    pub deps: CoreDeps,
    pub store: Arc<InMemoryStore>,
    pub locks: Arc<InMemorySeatLocker>,
    pub events: Arc<RecordingEventPublisher>,
    pub gateway: Arc<MockPaymentGateway>,
    pub clock: Arc<ManualClock>,
    pub show: Show,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None, MockPaymentGateway::new())
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        Self::build(None, gateway)
    }

    /// Seat locks that never refuse, so only the store guards seats
    pub fn with_fail_open_locks() -> Self {
        Self::build(Some(Arc::new(FailOpenLocker)), MockPaymentGateway::new())
    }

    fn build(locker: Option<Arc<dyn SeatLocker>>, gateway: MockPaymentGateway) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let locks = Arc::new(InMemorySeatLocker::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let gateway = Arc::new(gateway);
        let clock = Arc::new(ManualClock::default());

        let starts_at = clock.now() + Duration::hours(2);
        let show = Show {
            id: Uuid::new_v4(),
            movie_title: "Metropolis".to_string(),
            starts_at,
            ends_at: starts_at + Duration::hours(2),
            base_cost: dec!(200.00),
            premium_seats: BTreeSet::from(["C5".to_string()]),
        };
        store.insert_show(show.clone());

        let deps = CoreDeps {
            shows: store.clone(),
            bookings: store.clone(),
            holds: store.clone(),
            payments: store.clone(),
            wallets: store.clone(),
            locks: locker.unwrap_or_else(|| locks.clone() as Arc<dyn SeatLocker>),
            events: events.clone(),
            gateway: gateway.clone(),
            clock: clock.clone(),
        };
        let core = Arc::new(CinemaCore::new(deps.clone(), BookingRules::default()));

        Self {
            core,
            deps,
            store,
            locks,
            events,
            gateway,
            clock,
            show,
        }
    }

    /// A fresh core over the same store, as after a process restart
    pub fn restart(&self) -> CinemaCore {
        CinemaCore::new(self.deps.clone(), BookingRules::default())
    }

    /// Move both the domain clock and tokio time. Needs paused tokio time.
    pub async fn elapse(&self, by: Duration) {
        self.clock.advance(by);
        if let Ok(wait) = by.to_std() {
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn reserve(&self, username: &str, seat_list: &[&str]) -> ReservationHandle {
        self.core
            .create_reservation(self_service(self.show.id, username, seat_list))
            .await
            .unwrap()
    }
}

pub fn seats(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn self_service(show_id: Uuid, username: &str, seat_list: &[&str]) -> ReservationRequest {
    ReservationRequest {
        show_id,
        seats: seats(seat_list),
        origin: ReservationOrigin::SelfService {
            username: username.to_string(),
        },
    }
}

pub fn counter(show_id: Uuid, seat_list: &[&str], amount_paid: Decimal) -> ReservationRequest {
    ReservationRequest {
        show_id,
        seats: seats(seat_list),
        origin: ReservationOrigin::Counter {
            customer: WalkInCustomer {
                name: "Walk-in Guest".to_string(),
                phone: "555-0199".to_string(),
                email: None,
            },
            amount_paid,
        },
    }
}

pub fn customer(name: &str) -> Caller {
    Caller::Customer(name.to_string())
}

pub fn admin() -> Caller {
    Caller::Admin("box-office".to_string())
}

pub fn card() -> CardDetails {
    CardDetails::new("4111111111111111", "123", "12/30", "Alice Example")
}

pub struct FailOpenLocker;

#[async_trait]
impl SeatLocker for FailOpenLocker {
    async fn try_lock(
        &self,
        _show_id: Uuid,
        _seats: &[String],
        _token: &str,
        _ttl: std::time::Duration,
    ) -> Result<SeatLock, StoreError> {
        Ok(SeatLock::Acquired)
    }

    async fn unlock(&self, _show_id: Uuid, _seats: &[String], _token: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
