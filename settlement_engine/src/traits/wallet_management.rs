use thiserror::Error;

use crate::db_types::{AccountId, LedgerEntry, OrderId, WalletAccount, WalletTransaction};
use settle_common::Money;

/// The internal ledger.
///
/// Accounts are created implicitly on their first credit. Every movement appends a [`WalletTransaction`] and updates
/// the account balance in the same database transaction. Balances never go negative: a debit that would overdraw the
/// account fails with [`WalletError::InsufficientFunds`] and leaves no trace.
///
/// Entries carrying an idempotency key are applied at most once. Repeating the write returns the original transaction
/// and `false` in the second parameter.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    async fn fetch_wallet(&self, account_id: &AccountId) -> Result<Option<WalletAccount>, WalletError>;

    async fn credit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError>;

    async fn debit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError>;

    /// Transaction history for the account, newest first.
    async fn fetch_transactions(&self, account_id: &AccountId) -> Result<Vec<WalletTransaction>, WalletError>;

    async fn fetch_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<WalletTransaction>, WalletError>;

    async fn fetch_payout_destination(&self, account_id: &AccountId) -> Result<Option<String>, WalletError>;

    async fn set_payout_destination(&self, account_id: &AccountId, destination: &str) -> Result<(), WalletError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient funds in wallet {account}: balance {balance}, requested {requested}")]
    InsufficientFunds { account: AccountId, balance: Money, requested: Money },
    #[error("Ledger amounts must be positive. Got {0}")]
    InvalidAmount(Money),
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::DatabaseError(e.to_string())
    }
}
