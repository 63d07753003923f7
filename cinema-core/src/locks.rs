use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatLock {
    Acquired,
    /// Seats currently locked by someone else. Nothing was acquired.
    Contended(Vec<String>),
}

/// Short-lived per-seat locks bracketing reservation creation.
///
/// `try_lock` is all-or-nothing: either every seat is locked under `token`,
/// or none is. Locks expire on their own after `ttl`.
#[async_trait]
pub trait SeatLocker: Send + Sync {
    async fn try_lock(
        &self,
        show_id: Uuid,
        seats: &[String],
        token: &str,
        ttl: Duration,
    ) -> Result<SeatLock, StoreError>;

    /// Releases the seats still held under `token`; others are left alone.
    async fn unlock(&self, show_id: Uuid, seats: &[String], token: &str) -> Result<(), StoreError>;
}
