mod common;

use chrono::Duration;
use cinema_core::{Clock, HoldRepository, SeatLocker};
use cinema_shared::{BookingStatus, PaymentMethod, PaymentType};
use common::*;
use rust_decimal_macros::dec;
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::test]
async fn test_create_reservation_holds_seats() {
    let h = Harness::new();
    let now = h.clock.now();

    let handle = h.reserve("alice", &["A2", "A1"]).await;

    assert_eq!(handle.status, BookingStatus::Pending);
    assert_eq!(handle.seats, seats(&["A1", "A2"]));
    assert_eq!(handle.amount_due, dec!(400.00));
    assert_eq!(handle.expires_at, now + Duration::minutes(5));
    assert_eq!(h.store.seat_rows(h.show.id), seats(&["A1", "A2"]));
    assert_eq!(h.store.hold_count(), 1);
    assert_eq!(h.core.supervisor().deadline(handle.booking_id), Some(handle.expires_at));
    assert_eq!(h.events.topics(), vec!["reservation.created"]);
    assert_eq!(h.locks.held(h.show.id), 0);
}

#[tokio::test]
async fn test_premium_seat_priced_with_surcharge() {
    let h = Harness::new();

    let handle = h.reserve("alice", &["C5"]).await;

    assert_eq!(handle.amount_due, dec!(250.00));
}

#[tokio::test]
async fn test_seat_held_by_pending_booking_is_unavailable() {
    let h = Harness::new();
    h.reserve("alice", &["A1"]).await;

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "bob", &["A1", "A2"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SEATS_UNAVAILABLE");
    assert!(err.to_string().contains("A1"));
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.store.seat_rows(h.show.id), seats(&["A1"]));
}

#[tokio::test]
async fn test_seats_locked_by_concurrent_request_are_unavailable() {
    let h = Harness::new();
    h.locks
        .try_lock(h.show.id, &seats(&["A1"]), "other-request", std::time::Duration::from_secs(10))
        .await
        .unwrap();

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "alice", &["A1"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SEATS_UNAVAILABLE");
    assert_eq!(h.store.booking_count(), 0);
}

#[tokio::test]
async fn test_request_validation() {
    let h = Harness::new();
    let eleven: Vec<String> = (1..=11).map(|n| format!("B{}", n)).collect();
    let eleven: Vec<&str> = eleven.iter().map(String::as_str).collect();

    let cases = [
        (self_service(h.show.id, "alice", &[]), "INVALID_SEAT_COUNT"),
        (self_service(h.show.id, "alice", &eleven), "INVALID_SEAT_COUNT"),
        (self_service(h.show.id, "alice", &["A1", "A1"]), "DUPLICATE_SEAT"),
        (self_service(h.show.id, "alice", &["1A"]), "INVALID_SEAT_NUMBER"),
        (self_service(Uuid::new_v4(), "alice", &["A1"]), "SHOW_NOT_FOUND"),
    ];
    for (request, code) in cases {
        let err = h.core.create_reservation(request).await.unwrap_err();
        assert_eq!(err.code(), code);
    }
    assert_eq!(h.store.booking_count(), 0);
}

#[tokio::test]
async fn test_show_already_started_is_rejected() {
    let h = Harness::new();
    h.clock.set(h.show.starts_at);

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "alice", &["A1"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SHOW_ALREADY_STARTED");
}

#[tokio::test]
async fn test_counter_booking_amount_must_match_exactly() {
    let h = Harness::new();

    let err = h
        .core
        .create_reservation(counter(h.show.id, &["A1", "A2", "C5"], dec!(649.99)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_AMOUNT");
    assert_eq!(h.store.booking_count(), 0);

    let handle = h
        .core
        .create_reservation(counter(h.show.id, &["A1", "A2", "C5"], dec!(650.00)))
        .await
        .unwrap();
    assert_eq!(handle.amount_due, dec!(650.00));

    let details = h.core.get_reservation(handle.booking_id, &admin()).await.unwrap();
    assert_eq!(details.booking.payment_type, PaymentType::Cash);
    assert_eq!(details.booking.owner.display_name(), "Walk-in Guest");
}

#[tokio::test]
async fn test_seat_write_failure_leaves_no_booking() {
    let h = Harness::new();
    h.store.fail_operation("insert_seats");

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "alice", &["A1"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DATA_ACCESS_ERROR");
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.hold_count(), 0);
    assert_eq!(h.locks.held(h.show.id), 0);
}

#[tokio::test]
async fn test_hold_write_failure_leaves_no_booking() {
    let h = Harness::new();
    h.store.fail_operation("insert_hold");

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "alice", &["A1"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DATA_ACCESS_ERROR");
    assert_eq!(h.store.booking_count(), 0);
    assert!(h.store.seat_rows(h.show.id).is_empty());
}

#[tokio::test]
async fn test_scheduler_failure_rolls_back_everything() {
    let h = Harness::new();
    h.core.shutdown();

    let err = h
        .core
        .create_reservation(self_service(h.show.id, "alice", &["A1"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SCHEDULER_UNAVAILABLE");
    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.hold_count(), 0);
    assert!(h.store.seat_rows(h.show.id).is_empty());
    assert!(h.events.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_same_seat_book_once() {
    let h = Harness::new();
    let mut set = JoinSet::new();
    for i in 0..8 {
        let core = h.core.clone();
        let request = self_service(h.show.id, &format!("user{}", i), &["A1"]);
        set.spawn(async move { core.create_reservation(request).await });
    }

    let mut won = 0;
    while let Some(joined) = set.join_next().await {
        match joined.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e.code(), "SEATS_UNAVAILABLE"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.store.seat_rows(h.show.id), seats(&["A1"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_key_prevents_double_booking_without_locks() {
    let h = Harness::with_fail_open_locks();
    let mut set = JoinSet::new();
    for i in 0..8 {
        let core = h.core.clone();
        let request = self_service(h.show.id, &format!("user{}", i), &["A1", "A2"]);
        set.spawn(async move { core.create_reservation(request).await });
    }

    let mut won = 0;
    while let Some(joined) = set.join_next().await {
        match joined.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e.code(), "SEATS_UNAVAILABLE"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.store.hold_count(), 1);
    assert_eq!(h.store.seat_rows(h.show.id), seats(&["A1", "A2"]));
}

#[tokio::test]
async fn test_cancel_pending_releases_seats() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;

    h.core
        .cancel_reservation(handle.booking_id, &customer("alice"))
        .await
        .unwrap();

    assert_eq!(h.store.booking_count(), 0);
    assert_eq!(h.store.hold_count(), 0);
    assert_eq!(h.core.supervisor().active_timers(), 0);
    assert_eq!(h.events.topics(), vec!["reservation.created", "reservation.released"]);

    // Seat is free again
    h.reserve("bob", &["A1"]).await;
}

#[tokio::test]
async fn test_cancel_requires_owner_or_admin() {
    let h = Harness::new();
    let first = h.reserve("alice", &["A1"]).await;
    let second = h.reserve("alice", &["A2"]).await;

    let err = h
        .core
        .cancel_reservation(first.booking_id, &customer("mallory"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_BOOKING_OWNER");

    h.core.cancel_reservation(second.booking_id, &admin()).await.unwrap();
    assert_eq!(h.store.booking_count(), 1);
}

#[tokio::test]
async fn test_cancel_confirmed_booking_is_rejected() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap();

    let err = h
        .core
        .cancel_reservation(handle.booking_id, &customer("alice"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_BOOKING_STATUS");
    assert_eq!(h.store.booking_count(), 1);
}

#[tokio::test]
async fn test_cancel_during_settlement_is_rejected() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    let now = h.clock.now();
    h.store
        .claim_hold(handle.booking_id, now, now + Duration::seconds(60))
        .await
        .unwrap();

    let err = h
        .core
        .cancel_reservation(handle.booking_id, &customer("alice"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SETTLEMENT_IN_PROGRESS");
    assert_eq!(h.store.booking_count(), 1);
    assert_eq!(h.core.supervisor().active_timers(), 1);
}

#[tokio::test]
async fn test_get_and_list_reservations() {
    let h = Harness::new();
    let older = h.reserve("alice", &["A1"]).await;
    h.clock.advance(Duration::seconds(1));
    let newer = h.reserve("alice", &["B1", "B2"]).await;
    h.reserve("bob", &["C1"]).await;

    let listed = h.core.list_reservations("alice").await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|d| d.booking.id).collect();
    assert_eq!(ids, vec![newer.booking_id, older.booking_id]);
    assert_eq!(listed[0].seats, seats(&["B1", "B2"]));

    let details = h
        .core
        .get_reservation(older.booking_id, &customer("alice"))
        .await
        .unwrap();
    assert_eq!(details.seats, seats(&["A1"]));

    let err = h
        .core
        .get_reservation(older.booking_id, &customer("bob"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_BOOKING_OWNER");

    let err = h
        .core
        .get_reservation(Uuid::new_v4(), &admin())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BOOKING_NOT_FOUND");
}

#[tokio::test]
async fn test_check_in_lifecycle() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;

    let err = h.core.check_in(handle.booking_id).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_BOOKING_STATUS");

    h.core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap();
    let booking = h.core.check_in(handle.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::CheckedIn);
    assert_eq!(h.events.topics().last(), Some(&"booking.checked_in"));

    let err = h.core.check_in(handle.booking_id).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_BOOKING_STATUS");
}

#[tokio::test]
async fn test_check_in_after_show_end_is_rejected() {
    let h = Harness::new();
    let handle = h.reserve("alice", &["A1"]).await;
    h.core
        .confirm_reservation(handle.booking_id, &customer("alice"), PaymentMethod::Card(card()))
        .await
        .unwrap();
    h.clock.set(h.show.ends_at);

    let err = h.core.check_in(handle.booking_id).await.unwrap_err();

    assert_eq!(err.code(), "SHOW_ENDED");
}
