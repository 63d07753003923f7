//! Hold expiration.
//!
//! One tokio task per Pending reservation sleeps until the hold deadline and
//! then releases the booking unless it was resolved meanwhile. Timers are
//! keyed by booking id so confirmation and cancellation can abort them. The
//! release itself re-reads durable state, so a late or duplicate wake is a
//! no-op.

use chrono::{DateTime, Utc};
use cinema_core::{
    BookingError, BookingRepository, Clock, CoreResult, EventPublisher, HoldRepository,
    PendingRelease,
};
use cinema_shared::{BookingEvent, ReleaseReason};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// No hold, or the booking already left Pending
    AlreadyResolved,
    /// Not releasable yet; try again at the given instant
    Deferred(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub released: usize,
    pub rescheduled: usize,
}

struct Timer {
    generation: u64,
    deadline: DateTime<Utc>,
    handle: AbortHandle,
}

struct Inner {
    bookings: Arc<dyn BookingRepository>,
    holds: Arc<dyn HoldRepository>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    timers: Mutex<HashMap<Uuid, Timer>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct ExpirationSupervisor {
    inner: Arc<Inner>,
}

impl ExpirationSupervisor {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        holds: Arc<dyn HoldRepository>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bookings,
                holds,
                events,
                clock,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Start (or replace) the timer for a booking. Needs a running tokio runtime.
    pub fn schedule(&self, booking_id: Uuid, deadline: DateTime<Utc>) -> CoreResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BookingError::SchedulerUnavailable("supervisor is shut down".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| BookingError::SchedulerUnavailable(e.to_string()))?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);

        // Spawn under the lock so a timer that fires at once cannot forget
        // itself before it is registered.
        let mut timers = self.inner.timers();
        let inner = self.inner.clone();
        let handle = runtime
            .spawn(async move { inner.run_timer(booking_id, deadline, generation).await })
            .abort_handle();
        if let Some(previous) = timers.insert(
            booking_id,
            Timer {
                generation,
                deadline,
                handle,
            },
        ) {
            previous.handle.abort();
        }
        debug!(booking_id = %booking_id, deadline = %deadline, "Expiration timer scheduled");
        Ok(())
    }

    /// Abort the timer for a resolved booking. Returns whether one was running.
    pub fn cancel(&self, booking_id: Uuid) -> bool {
        match self.inner.timers().remove(&booking_id) {
            Some(timer) => {
                timer.handle.abort();
                debug!(booking_id = %booking_id, "Expiration timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn active_timers(&self) -> usize {
        self.inner.timers().len()
    }

    pub fn deadline(&self, booking_id: Uuid) -> Option<DateTime<Utc>> {
        self.inner.timers().get(&booking_id).map(|t| t.deadline)
    }

    /// Release the booking if its hold has lapsed and nothing resolved it.
    pub async fn release_if_unresolved(&self, booking_id: Uuid) -> CoreResult<ReleaseOutcome> {
        self.inner.release_if_unresolved(booking_id).await
    }

    /// Startup pass: release holds that lapsed while the process was down,
    /// reschedule the rest.
    pub async fn recover(&self) -> CoreResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let now = self.inner.clock.now();

        for hold in self.inner.holds.list_holds().await? {
            let outcome = if hold.is_expired(now) {
                self.inner.release_if_unresolved(hold.booking_id).await?
            } else {
                ReleaseOutcome::Deferred(hold.expires_at)
            };
            match outcome {
                ReleaseOutcome::Released => report.released += 1,
                ReleaseOutcome::Deferred(at) => {
                    self.schedule(hold.booking_id, at)?;
                    report.rescheduled += 1;
                }
                ReleaseOutcome::AlreadyResolved => {}
            }
        }

        info!(
            released = report.released,
            rescheduled = report.rescheduled,
            "Expiration recovery complete"
        );
        Ok(report)
    }

    /// Release every lapsed hold, whatever its timer is doing. Returns the
    /// number released.
    pub async fn sweep(&self) -> CoreResult<usize> {
        let now = self.inner.clock.now();
        let mut released = 0;

        for hold in self.inner.holds.list_holds().await? {
            if !hold.is_expired(now) || hold.active_claim(now).is_some() {
                continue;
            }
            match self.inner.release_if_unresolved(hold.booking_id).await {
                Ok(ReleaseOutcome::Released) => {
                    self.cancel(hold.booking_id);
                    released += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(booking_id = %hold.booking_id, error = %e, "Sweep could not release hold");
                }
            }
        }

        if released > 0 {
            info!(released, "Expiration sweep released lapsed holds");
        }
        Ok(released)
    }

    /// Abort every timer. Scheduling fails from now on.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let timers: Vec<Timer> = self.inner.timers().drain().map(|(_, t)| t).collect();
        for timer in &timers {
            timer.handle.abort();
        }
        info!(aborted = timers.len(), "Expiration supervisor shut down");
    }
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<Uuid, Timer>> {
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_timer(self: Arc<Self>, booking_id: Uuid, mut deadline: DateTime<Utc>, generation: u64) {
        loop {
            let wait = (deadline - self.clock.now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.release_if_unresolved(booking_id).await {
                Ok(ReleaseOutcome::Deferred(next)) => {
                    debug!(booking_id = %booking_id, until = %next, "Release deferred");
                    deadline = next;
                }
                Ok(_) => break,
                Err(e) => {
                    // Hold and booking are intact; the periodic sweep retries
                    error!(booking_id = %booking_id, error = %e, "Expiration release failed");
                    break;
                }
            }
        }
        self.forget(booking_id, generation);
    }

    fn forget(&self, booking_id: Uuid, generation: u64) {
        let mut timers = self.timers();
        if timers.get(&booking_id).is_some_and(|t| t.generation == generation) {
            timers.remove(&booking_id);
        }
    }

    async fn release_if_unresolved(&self, booking_id: Uuid) -> CoreResult<ReleaseOutcome> {
        let now = self.clock.now();

        let Some(hold) = self.holds.get_hold(booking_id).await? else {
            debug!(booking_id = %booking_id, "No hold left, nothing to release");
            return Ok(ReleaseOutcome::AlreadyResolved);
        };
        if !hold.is_expired(now) {
            return Ok(ReleaseOutcome::Deferred(hold.expires_at));
        }
        if let Some(until) = hold.active_claim(now) {
            return Ok(ReleaseOutcome::Deferred(until));
        }

        let pending = self
            .bookings
            .get_booking(booking_id)
            .await?
            .is_some_and(|b| b.is_pending());
        if !pending {
            // Hold outlived its booking's Pending state; drop it
            self.holds.remove_hold(booking_id).await?;
            debug!(booking_id = %booking_id, "Stale hold removed");
            return Ok(ReleaseOutcome::AlreadyResolved);
        }

        match self.bookings.release_pending(booking_id, now).await? {
            PendingRelease::Released => {}
            // A settlement claimed it between the read and the delete
            PendingRelease::Claimed(until) => return Ok(ReleaseOutcome::Deferred(until)),
            PendingRelease::NotPending => {
                debug!(booking_id = %booking_id, "Booking left Pending before release");
                return Ok(ReleaseOutcome::AlreadyResolved);
            }
        }

        info!(booking_id = %booking_id, "Reservation expired, seats released");
        let event = BookingEvent::ReservationReleased {
            booking_id,
            reason: ReleaseReason::Expired,
            timestamp: now.timestamp(),
        };
        if let Err(e) = self.events.publish(&event).await {
            warn!(booking_id = %booking_id, error = %e, "Failed to publish release event");
        }
        Ok(ReleaseOutcome::Released)
    }
}
