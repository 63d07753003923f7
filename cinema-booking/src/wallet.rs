use cinema_core::{BalanceUpdate, BookingError, Clock, CoreResult, WalletRepository};
use cinema_shared::{Wallet, WalletTransaction, WalletTransactionType};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Non-negative balances with an append-only trail.
///
/// Every mutation is a single atomic delta on the store, which refuses any
/// delta that would take the balance below zero.
#[derive(Clone)]
pub struct WalletLedger {
    wallets: Arc<dyn WalletRepository>,
    clock: Arc<dyn Clock>,
}

impl WalletLedger {
    pub fn new(wallets: Arc<dyn WalletRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { wallets, clock }
    }

    /// Safe to call more than once per owner
    pub async fn open_wallet(&self, owner: &str) -> CoreResult<Wallet> {
        Ok(self.wallets.create_wallet(owner, self.clock.now()).await?)
    }

    pub async fn balance(&self, owner: &str) -> CoreResult<Decimal> {
        self.wallets
            .get_wallet(owner)
            .await?
            .map(|wallet| wallet.balance)
            .ok_or_else(|| BookingError::WalletNotFound(owner.to_string()))
    }

    pub async fn history(&self, owner: &str) -> CoreResult<Vec<WalletTransaction>> {
        Ok(self.wallets.transactions(owner).await?)
    }

    /// Credit funds whose origin is `transaction_id` (e.g. a gateway charge)
    pub async fn add_to_balance(
        &self,
        owner: &str,
        amount: Decimal,
        transaction_id: String,
    ) -> CoreResult<WalletTransaction> {
        self.apply(owner, amount, WalletTransactionType::Add, transaction_id, None)
            .await
    }

    pub async fn deduct_from_balance(
        &self,
        owner: &str,
        amount: Decimal,
        booking_id: Option<Uuid>,
    ) -> CoreResult<WalletTransaction> {
        let transaction_id = format!("wallet_{}", Uuid::new_v4().simple());
        self.apply(owner, amount, WalletTransactionType::Deduct, transaction_id, booking_id)
            .await
    }

    pub async fn refund(
        &self,
        owner: &str,
        amount: Decimal,
        booking_id: Option<Uuid>,
    ) -> CoreResult<WalletTransaction> {
        let transaction_id = format!("refund_{}", Uuid::new_v4().simple());
        self.apply(owner, amount, WalletTransactionType::Refund, transaction_id, booking_id)
            .await
    }

    async fn apply(
        &self,
        owner: &str,
        amount: Decimal,
        kind: WalletTransactionType,
        transaction_id: String,
        booking_id: Option<Uuid>,
    ) -> CoreResult<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(BookingError::NonPositiveAmount(amount));
        }
        let delta = match kind {
            WalletTransactionType::Deduct => -amount,
            WalletTransactionType::Add | WalletTransactionType::Refund => amount,
        };

        let balance_after = match self.wallets.apply_delta(owner, delta, self.clock.now()).await? {
            BalanceUpdate::Applied(balance) => balance,
            BalanceUpdate::Insufficient(balance) => {
                warn!(owner, requested = %amount, balance = %balance, "Deduction rejected, insufficient funds");
                return Err(BookingError::InsufficientFunds {
                    balance,
                    requested: amount,
                });
            }
            BalanceUpdate::NoWallet => return Err(BookingError::WalletNotFound(owner.to_string())),
        };

        let entry = WalletTransaction {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            transaction_id,
            kind,
            amount: delta,
            balance_after,
            booking_id,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.wallets.append_transaction(&entry).await {
            // Balance must stay the sum of the trail
            self.reverse(owner, delta).await;
            return Err(e.into());
        }

        info!(
            owner,
            kind = kind.as_str(),
            amount = %delta,
            balance = %balance_after,
            "Wallet updated"
        );
        Ok(entry)
    }

    async fn reverse(&self, owner: &str, delta: Decimal) {
        match self.wallets.apply_delta(owner, -delta, self.clock.now()).await {
            Ok(BalanceUpdate::Applied(_)) => {}
            Ok(outcome) => {
                error!(owner, delta = %delta, ?outcome, "Wallet delta could not be reversed, balance needs reconciliation");
            }
            Err(e) => {
                error!(owner, delta = %delta, error = %e, "Failed to reverse wallet delta, balance needs reconciliation");
            }
        }
    }
}
