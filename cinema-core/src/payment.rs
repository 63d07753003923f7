use async_trait::async_trait;
use cinema_shared::CardDetails;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("card declined: {0}")]
    Declined(String),
    #[error("invalid card: {0}")]
    InvalidCard(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// External card processor.
///
/// A call is at-most-once from the caller's point of view: no retries, and an
/// error means nothing was charged.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount` to the card and return the processor transaction id
    async fn charge(&self, card: &CardDetails, amount: Decimal) -> Result<String, GatewayError>;
}
