use async_trait::async_trait;
use cinema_shared::BookingEvent;

use crate::StoreError;

/// Outbound channel for domain events. Delivery is best effort: callers log
/// a failed publish and carry on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> Result<(), StoreError>;
}
