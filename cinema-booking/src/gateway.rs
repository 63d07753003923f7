//! Mock card processor for development and tests.

use async_trait::async_trait;
use cinema_core::{GatewayError, PaymentGateway};
use cinema_shared::CardDetails;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    Approve,
    Decline(String),
    Outage,
}

/// Approves well-formed cards unless told otherwise, and counts successful charges
#[derive(Debug)]
pub struct MockPaymentGateway {
    mode: Mutex<GatewayMode>,
    latency: Duration,
    charges: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Each charge sleeps for `latency` before answering
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            mode: Mutex::new(GatewayMode::Approve),
            latency,
            charges: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = mode;
    }

    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    fn mode(&self) -> GatewayMode {
        self.mode
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_card(card: &CardDetails) -> Result<(), GatewayError> {
    let number = card.card_number.expose();
    if !(12..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::InvalidCard("card number must be 12-19 digits".to_string()));
    }
    let cvv = card.cvv.expose();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::InvalidCard("cvv must be 3 or 4 digits".to_string()));
    }
    let expiry_ok = card
        .expiry
        .split_once('/')
        .and_then(|(month, year)| Some((month.parse::<u8>().ok()?, year.parse::<u16>().ok()?)))
        .is_some_and(|(month, _)| (1..=12).contains(&month));
    if !expiry_ok {
        return Err(GatewayError::InvalidCard("expiry must be MM/YY".to_string()));
    }
    if card.holder_name.trim().is_empty() {
        return Err(GatewayError::InvalidCard("holder name is required".to_string()));
    }
    Ok(())
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, card: &CardDetails, amount: Decimal) -> Result<String, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        validate_card(card)?;
        if amount <= Decimal::ZERO {
            return Err(GatewayError::Declined(format!("invalid amount {}", amount)));
        }

        match self.mode() {
            GatewayMode::Approve => {}
            GatewayMode::Decline(reason) => return Err(GatewayError::Declined(reason)),
            GatewayMode::Outage => {
                return Err(GatewayError::Unavailable("processor not responding".to_string()))
            }
        }

        self.charges.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("mock_txn_{}", Uuid::new_v4().simple());
        info!(
            card = %card.card_number.last_four(),
            amount = %amount,
            transaction_id = %transaction_id,
            "Mock charge approved"
        );
        Ok(transaction_id)
    }
}
