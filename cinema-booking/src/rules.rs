use chrono::Duration;
use rust_decimal::Decimal;
use tracing::warn;

/// Longest accepted window for any timed rule
pub const MAX_RULE_SECONDS: u64 = 24 * 60 * 60;

/// Tunables for reservation and settlement
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRules {
    /// Payment window of a Pending reservation
    pub hold_duration: Duration,
    pub max_seats_per_booking: usize,
    pub premium_surcharge: Decimal,
    /// How long one settlement may keep a hold claimed
    pub settlement_lease: Duration,
    /// Lifetime of the per-seat locks taken during creation
    pub seat_lock_ttl: std::time::Duration,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(5),
            max_seats_per_booking: 10,
            premium_surcharge: Decimal::new(5000, 2),
            settlement_lease: Duration::seconds(60),
            seat_lock_ttl: std::time::Duration::from_secs(10),
        }
    }
}

impl BookingRules {
    /// Windows above `MAX_RULE_SECONDS` are clamped to it.
    pub fn from_seconds(
        hold_seconds: u64,
        max_seats_per_booking: usize,
        premium_surcharge: Decimal,
        settlement_lease_seconds: u64,
        seat_lock_seconds: u64,
    ) -> Self {
        Self {
            hold_duration: Duration::seconds(clamp_window("hold_seconds", hold_seconds) as i64),
            max_seats_per_booking,
            premium_surcharge,
            settlement_lease: Duration::seconds(
                clamp_window("settlement_lease_seconds", settlement_lease_seconds) as i64,
            ),
            seat_lock_ttl: std::time::Duration::from_secs(clamp_window("seat_lock_seconds", seat_lock_seconds)),
        }
    }
}

fn clamp_window(rule: &str, seconds: u64) -> u64 {
    if seconds > MAX_RULE_SECONDS {
        warn!(rule, configured = seconds, max = MAX_RULE_SECONDS, "Rule out of range, clamped");
    }
    seconds.min(MAX_RULE_SECONDS)
}
