use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment window of a Pending booking.
///
/// The row exists exactly while the booking may still be paid for. A
/// settlement in flight marks it with `claimed_until`; until that lease lapses
/// nobody else may release or claim the hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationHold {
    pub booking_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub claimed_until: Option<DateTime<Utc>>,
}

impl ReservationHold {
    pub fn new(booking_id: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            booking_id,
            expires_at,
            claimed_until: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// End of the settlement lease, if one is still running at `now`
    pub fn active_claim(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.claimed_until.filter(|until| *until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_is_inclusive_of_deadline() {
        let now = Utc::now();
        let hold = ReservationHold::new(Uuid::new_v4(), now);
        assert!(hold.is_expired(now));
        assert!(!hold.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn test_lapsed_claim_is_not_active() {
        let now = Utc::now();
        let mut hold = ReservationHold::new(Uuid::new_v4(), now + Duration::minutes(5));
        assert_eq!(hold.active_claim(now), None);

        hold.claimed_until = Some(now + Duration::seconds(30));
        assert_eq!(hold.active_claim(now), hold.claimed_until);
        assert_eq!(hold.active_claim(now + Duration::seconds(31)), None);
    }
}
