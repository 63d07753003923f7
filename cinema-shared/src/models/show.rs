use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A scheduled screening of a movie (read-only reference data)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    pub id: Uuid,
    pub movie_title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Price of a standard seat
    pub base_cost: Decimal,
    pub premium_seats: BTreeSet<String>,
}

impl Show {
    pub fn is_premium(&self, seat_number: &str) -> bool {
        self.premium_seats.contains(seat_number)
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }
}
