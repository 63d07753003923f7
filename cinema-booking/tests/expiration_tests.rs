mod common;

use chrono::Duration;
use cinema_booking::RecoveryReport;
use cinema_core::{Clock, HoldRepository};
use cinema_shared::{BookingEvent, BookingStatus, PaymentMethod, ReleaseReason};
use common::*;

fn release_reasons(h: &Harness) -> Vec<ReleaseReason> {
    h.events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            BookingEvent::ReservationReleased { reason, .. } => Some(reason),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_reservation_released_after_hold() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1", "A2"]).await;

    h.elapse(Duration::minutes(4)).await;
    assert_eq!(h.store.booking_count(), 1);

    h.elapse(Duration::seconds(61)).await;
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.hold_count(), 0);
    assert!(h.store.seat_rows(h.show.id).is_empty());
    assert_eq!(h.core.supervisor().active_timers(), 0);
    assert_eq!(release_reasons(&h), vec![ReleaseReason::Expired]);

    let err = h
        .core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BOOKING_NOT_FOUND");
    assert_eq!(h.gateway.charge_count(), 0);

    // Released seats can be booked again
    h.reserve("bob", &["A1"]).await;
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_booking_survives_deadline() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap();
    assert_eq!(h.core.supervisor().active_timers(), 0);

    h.elapse(Duration::minutes(10)).await;

    let details = h
        .core
        .get_reservation(handle.booking_id, &customer("alice"))
        .await
        .unwrap();
    assert_eq!(details.booking.status, BookingStatus::Confirmed);
    assert_eq!(details.seats, seats(&["A1"]));
    assert!(release_reasons(&h).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_reservation_timer_does_not_touch_new_booking() {
    let h = Harness::new();
    let first = h.reserve("alice", &["A1"]).await;
    h.core
        .cancel_reservation(first.booking_id, &customer("alice"))
        .await
        .unwrap();

    h.elapse(Duration::minutes(1)).await;
    let second = h.reserve("bob", &["A1"]).await;

    // Past the first booking's deadline, before the second's
    h.elapse(Duration::minutes(4) + Duration::seconds(30)).await;

    let details = h.core.get_reservation(second.booking_id, &admin()).await.unwrap();
    assert_eq!(details.booking.status, BookingStatus::Pending);
    assert_eq!(release_reasons(&h), vec![ReleaseReason::Cancelled]);
}

#[tokio::test]
async fn test_confirm_after_deadline_cleans_up_lazily() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;

    // Domain time passes the deadline before the timer gets to run
    h.clock.advance(Duration::minutes(5) + Duration::seconds(1));

    let err = h
        .core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RESERVATION_EXPIRED");
    assert_eq!(h.gateway.charge_count(), 0);
    assert_eq!(h.store.booking_count(), 0);
    assert!(h.store.seat_rows(h.show.id).is_empty());
    assert_eq!(h.core.supervisor().active_timers(), 0);
    assert_eq!(release_reasons(&h), vec![ReleaseReason::LazyCleanup]);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_settlement_defers_release() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;

    h.elapse(Duration::minutes(4) + Duration::seconds(50)).await;
    let now = h.clock.now();
    h.store
        .claim_hold(handle.booking_id, now, now + Duration::seconds(60))
        .await
        .unwrap();

    h.elapse(Duration::seconds(20)).await;
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.core.supervisor().active_timers(), 1);

    // Claim lapses without a settlement outcome
    h.elapse(Duration::seconds(41)).await;
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(release_reasons(&h), vec![ReleaseReason::Expired]);
}

#[tokio::test(start_paused = true)]
async fn test_recover_after_restart() {
    let h = Harness::new();
    let lapsing = h.reserve("alice", &["A1"]).await;
    h.elapse(Duration::minutes(3)).await;
    let surviving = h.reserve("bob", &["B1"]).await;

    // Process dies: timers are gone, durable holds remain
    h.core.shutdown();
    h.clock.advance(Duration::minutes(3));

    let restarted = h.restart();
    let report = restarted.recover().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            released: 1,
            rescheduled: 1
        }
    );
    assert!(restarted
        .get_reservation(lapsing.booking_id, &admin())
        .await
        .is_err());
    assert_eq!(
        restarted.supervisor().deadline(surviving.booking_id),
        Some(surviving.expires_at)
    );

    h.elapse(Duration::minutes(2) + Duration::seconds(1)).await;
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(restarted.supervisor().active_timers(), 0);
}

#[tokio::test]
async fn test_sweep_releases_holds_without_timers() {
    let h = Harness::new();
    h.reserve("alice", &["A1"]).await;
    h.reserve("bob", &["B1"]).await;
    h.core.shutdown();

    assert_eq!(h.core.sweep().await.unwrap(), 0);

    h.clock.advance(Duration::minutes(6));
    assert_eq!(h.core.sweep().await.unwrap(), 2);
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.core.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_skips_claimed_holds() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.clock.advance(Duration::minutes(5) + Duration::seconds(1));
    let now = h.clock.now();
    h.store
        .claim_hold(handle.booking_id, now - Duration::seconds(2), now + Duration::seconds(30))
        .await
        .unwrap();

    assert_eq!(h.core.sweep().await.unwrap(), 0);
    assert_eq!(h.store.booking_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_expiry_release_is_retried_by_sweep() {
    let h = Harness::new();
    h.reserve("alice", &["A1"]).await;
    h.store.fail_operation("release_pending");

    h.elapse(Duration::minutes(5) + Duration::seconds(1)).await;
    assert_eq!(h.core.supervisor().active_timers(), 0);
    // Nothing half-deleted: the hold still marks the booking for release
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.store.hold_count(), 1);

    h.store.clear_failures();
    assert_eq!(h.core.sweep().await.unwrap(), 1);
    assert_eq!(h.store.booking_count(), 0);
    assert!(h.store.seat_rows(h.show.id).is_empty());
    h.reserve("bob", &["A1"]).await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_expiry_release_is_recovered_after_restart() {
    let h = Harness::new();
    h.reserve("alice", &["A1"]).await;
    h.store.fail_operation("release_pending");
    h.elapse(Duration::minutes(5) + Duration::seconds(1)).await;
    h.core.shutdown();
    h.store.clear_failures();

    let restarted = h.restart();
    assert_eq!(
        restarted.recover().await.unwrap(),
        RecoveryReport {
            released: 1,
            rescheduled: 0
        }
    );
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.hold_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cancel_keeps_expiry_timer() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.store.fail_operation("release_pending");

    let err = h
        .core
        .cancel_reservation(handle.booking_id, &customer("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DATA_ACCESS_ERROR");
    assert_eq!(h.store.hold_count(), 1);
    assert_eq!(h.core.supervisor().deadline(handle.booking_id), Some(handle.expires_at));

    h.store.clear_failures();
    h.elapse(Duration::minutes(5) + Duration::seconds(1)).await;
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(release_reasons(&h), vec![ReleaseReason::Expired]);
    h.reserve("bob", &["A1"]).await;
}

#[tokio::test]
async fn test_failed_lazy_cleanup_is_retried_by_sweep() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.clock.advance(Duration::minutes(5) + Duration::seconds(1));
    h.store.fail_operation("release_pending");

    let err = h
        .core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RESERVATION_EXPIRED");
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.store.hold_count(), 1);

    h.store.clear_failures();
    assert_eq!(h.core.sweep().await.unwrap(), 1);
    assert_eq!(h.store.booking_count(), 0);
}
