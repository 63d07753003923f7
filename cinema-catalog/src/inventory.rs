use cinema_core::{BookingError, BookingRepository, CoreResult};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Answer to "are these seats free on this show"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Requested seats already assigned to a live booking
    pub taken: Vec<String>,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        self.taken.is_empty()
    }
}

/// Seat availability oracle, backed by the booking store
pub struct SeatInventory {
    bookings: Arc<dyn BookingRepository>,
    max_seats_per_booking: usize,
}

impl SeatInventory {
    pub fn new(bookings: Arc<dyn BookingRepository>, max_seats_per_booking: usize) -> Self {
        Self {
            bookings,
            max_seats_per_booking,
        }
    }

    /// Trim and upper-case every seat, then validate the set as a whole.
    /// Order of the request is kept.
    pub fn normalize_seats(&self, seats: &[String]) -> CoreResult<Vec<String>> {
        if seats.is_empty() || seats.len() > self.max_seats_per_booking {
            return Err(BookingError::InvalidSeatCount {
                requested: seats.len(),
                max: self.max_seats_per_booking,
            });
        }

        let mut seen = HashSet::with_capacity(seats.len());
        let mut normalized = Vec::with_capacity(seats.len());
        for raw in seats {
            let seat = raw.trim().to_ascii_uppercase();
            if !is_valid_seat_number(&seat) {
                return Err(BookingError::InvalidSeatNumber(raw.clone()));
            }
            if !seen.insert(seat.clone()) {
                return Err(BookingError::DuplicateSeat(seat));
            }
            normalized.push(seat);
        }
        Ok(normalized)
    }

    /// Seats of `seats` held by a Pending, Confirmed or CheckedIn booking.
    /// A store failure is an error, never "available".
    pub async fn check_availability(&self, show_id: Uuid, seats: &[String]) -> CoreResult<Availability> {
        let mut taken = self.bookings.taken_seats(show_id, seats).await?;
        taken.sort();
        taken.dedup();
        Ok(Availability { taken })
    }

    pub async fn ensure_available(&self, show_id: Uuid, seats: &[String]) -> CoreResult<()> {
        let availability = self.check_availability(show_id, seats).await?;
        if availability.is_available() {
            Ok(())
        } else {
            tracing::warn!(show_id = %show_id, taken = ?availability.taken, "Requested seats already taken");
            Err(BookingError::SeatsUnavailable(availability.taken))
        }
    }
}

/// Row label of letters followed by a seat index of digits, e.g. `A1`, `AB12`
fn is_valid_seat_number(seat: &str) -> bool {
    let row_len = seat.chars().take_while(|c| c.is_ascii_uppercase()).count();
    let index = &seat[row_len..];
    row_len > 0 && !index.is_empty() && index.chars().all(|c| c.is_ascii_digit())
}
