use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AccountId, LedgerEntry, OrderId, WalletTransaction, WalletTransactionType},
    engine_api::errors::SettlementError,
    traits::WalletManagement,
};
use settle_common::{Money, DEFAULT_CURRENCY_CODE};

/// A wallet balance together with its transaction log, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletStatement {
    pub account_id: AccountId,
    pub balance: Money,
    pub currency: String,
    pub transactions: Vec<WalletTransaction>,
}

/// `WalletApi` is the public face of the internal ledger: credits, debits and compensated transfers.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B: Clone> Clone for WalletApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    /// The account balance. Unknown accounts have a zero balance.
    pub async fn balance(&self, account_id: &AccountId) -> Result<Money, SettlementError> {
        let wallet = self.db.fetch_wallet(account_id).await?;
        Ok(wallet.map(|w| w.balance).unwrap_or_default())
    }

    pub async fn statement(&self, account_id: &AccountId) -> Result<WalletStatement, SettlementError> {
        let wallet = self.db.fetch_wallet(account_id).await?;
        let transactions = self.db.fetch_transactions(account_id).await?;
        let (balance, currency) = match wallet {
            Some(w) => (w.balance, w.currency),
            None => (Money::default(), DEFAULT_CURRENCY_CODE.to_string()),
        };
        Ok(WalletStatement { account_id: account_id.clone(), balance, currency, transactions })
    }

    pub async fn transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<WalletTransaction>, SettlementError> {
        Ok(self.db.fetch_transactions_for_order(order_id).await?)
    }

    /// Credits the account, creating it if necessary. A repeated write with the same idempotency key returns the
    /// original transaction without changing the balance.
    pub async fn credit(&self, entry: LedgerEntry) -> Result<WalletTransaction, SettlementError> {
        let account = entry.account_id.clone();
        let (tx, applied) = self.db.credit(entry).await?;
        if applied {
            debug!("💰️ Credited {} to {account} (tx #{})", tx.amount, tx.id);
        } else {
            debug!("💰️ Credit #{} to {account} was already applied", tx.id);
        }
        Ok(tx)
    }

    /// Debits the account. Fails with `InsufficientFunds`, and leaves the ledger untouched, if the balance does not
    /// cover the amount.
    pub async fn debit(&self, entry: LedgerEntry) -> Result<WalletTransaction, SettlementError> {
        let account = entry.account_id.clone();
        let (tx, applied) = self.db.debit(entry).await?;
        if applied {
            debug!("💰️ Debited {} from {account} (tx #{})", -tx.amount, tx.id);
        } else {
            debug!("💰️ Debit #{} from {account} was already applied", tx.id);
        }
        Ok(tx)
    }

    /// Moves `amount` from one account to another as a debit followed by a credit. If the credit fails after the
    /// debit has been committed, a reversing credit is written back to the source account.
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
        description: &str,
        order_id: Option<&OrderId>,
    ) -> Result<(WalletTransaction, WalletTransaction), SettlementError> {
        if from == to {
            return Err(SettlementError::Validation("Cannot transfer funds to the same account".into()));
        }
        let mut debit = LedgerEntry::new(from.clone(), amount, WalletTransactionType::TransferOut, description);
        let mut credit = LedgerEntry::new(to.clone(), amount, WalletTransactionType::TransferIn, description);
        if let Some(oid) = order_id {
            debit = debit.for_order(oid);
            credit = credit.for_order(oid);
        }
        let debit_tx = self.debit(debit).await?;
        let credit = credit.with_metadata(serde_json::json!({ "counterpart_tx": debit_tx.id, "from": from }));
        match self.credit(credit).await {
            Ok(credit_tx) => {
                info!("💰️ Transferred {amount} from {from} to {to}");
                Ok((debit_tx, credit_tx))
            },
            Err(e) => {
                warn!("💰️ Transfer credit to {to} failed ({e}). Reversing the debit of {amount} from {from}");
                let reversal = LedgerEntry::new(
                    from.clone(),
                    amount,
                    WalletTransactionType::Reversal,
                    format!("Reversal of failed transfer to {to}"),
                )
                .with_idempotency_key(format!("reversal:{}", debit_tx.id))
                .with_metadata(serde_json::json!({ "reverses_tx": debit_tx.id }));
                if let Err(re) = self.credit(reversal).await {
                    error!(
                        "💰️ Could not reverse debit #{} of {amount} from {from}: {re}. The ledger needs manual repair.",
                        debit_tx.id
                    );
                    return Err(SettlementError::InconsistentState(format!(
                        "Transfer debit #{} from {from} could not be reversed: {re}",
                        debit_tx.id
                    )));
                }
                Err(e)
            },
        }
    }

    pub async fn payout_destination(&self, account_id: &AccountId) -> Result<Option<String>, SettlementError> {
        Ok(self.db.fetch_payout_destination(account_id).await?)
    }

    pub async fn set_payout_destination(&self, account_id: &AccountId, destination: &str) -> Result<(), SettlementError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(SettlementError::Validation("Payout destination cannot be empty".into()));
        }
        self.db.set_payout_destination(account_id, destination).await?;
        info!("💰️ Payout destination updated for {account_id}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db_types::WalletAccount,
        test_utils::prepare_env::fresh_database,
        traits::WalletError,
        SqliteDatabase,
    };

    /// Delegates to the real ledger but refuses credits to the listed accounts.
    #[derive(Clone)]
    struct RefusingCredits {
        inner: SqliteDatabase,
        refuse: Vec<AccountId>,
    }

    impl WalletManagement for RefusingCredits {
        async fn fetch_wallet(&self, account_id: &AccountId) -> Result<Option<WalletAccount>, WalletError> {
            self.inner.fetch_wallet(account_id).await
        }

        async fn credit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError> {
            if self.refuse.contains(&entry.account_id) {
                return Err(WalletError::DatabaseError("ledger unavailable".into()));
            }
            self.inner.credit(entry).await
        }

        async fn debit(&self, entry: LedgerEntry) -> Result<(WalletTransaction, bool), WalletError> {
            self.inner.debit(entry).await
        }

        async fn fetch_transactions(&self, account_id: &AccountId) -> Result<Vec<WalletTransaction>, WalletError> {
            self.inner.fetch_transactions(account_id).await
        }

        async fn fetch_transactions_for_order(
            &self,
            order_id: &OrderId,
        ) -> Result<Vec<WalletTransaction>, WalletError> {
            self.inner.fetch_transactions_for_order(order_id).await
        }

        async fn fetch_payout_destination(&self, account_id: &AccountId) -> Result<Option<String>, WalletError> {
            self.inner.fetch_payout_destination(account_id).await
        }

        async fn set_payout_destination(&self, account_id: &AccountId, destination: &str) -> Result<(), WalletError> {
            self.inner.set_payout_destination(account_id, destination).await
        }
    }

    async fn funded_ledger() -> SqliteDatabase {
        let db = fresh_database().await;
        let alice = AccountId::from("alice");
        let top_up = LedgerEntry::new(alice, Money::from_cents(5000), WalletTransactionType::TransferIn, "Top up")
            .with_idempotency_key("topup:alice");
        db.credit(top_up).await.unwrap();
        db
    }

    fn refusing(db: SqliteDatabase, accounts: &[&str]) -> WalletApi<RefusingCredits> {
        WalletApi::new(RefusingCredits { inner: db, refuse: accounts.iter().map(|a| AccountId::from(*a)).collect() })
    }

    #[tokio::test]
    async fn transfer_moves_funds_between_wallets() {
        let api = WalletApi::new(funded_ledger().await);
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));
        let order_id = OrderId::from("ord-gift");

        let (out, incoming) = api.transfer(&alice, &bob, Money::from_cents(2000), "Gift", Some(&order_id)).await.unwrap();
        assert_eq!(out.tx_type, WalletTransactionType::TransferOut);
        assert_eq!(out.amount, Money::from_cents(-2000));
        assert_eq!(incoming.tx_type, WalletTransactionType::TransferIn);
        assert_eq!(incoming.amount, Money::from_cents(2000));
        assert!(incoming.metadata.unwrap().contains(&format!("\"counterpart_tx\":{}", out.id)));
        assert_eq!(api.balance(&alice).await.unwrap(), Money::from_cents(3000));
        assert_eq!(api.balance(&bob).await.unwrap(), Money::from_cents(2000));
        assert_eq!(api.transactions_for_order(&order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transfers_that_cannot_be_funded_change_nothing() {
        let api = WalletApi::new(funded_ledger().await);
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));
        let err = api.transfer(&alice, &bob, Money::from_cents(5001), "Too much", None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientFunds { .. }), "got {err}");
        let err = api.transfer(&alice, &alice, Money::from_cents(10), "Loop", None).await.unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)));
        assert_eq!(api.balance(&alice).await.unwrap(), Money::from_cents(5000));
        assert_eq!(api.statement(&bob).await.unwrap().transactions.len(), 0);
    }

    #[tokio::test]
    async fn failed_credit_is_reversed() {
        let api = refusing(funded_ledger().await, &["bob"]);
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));

        let err = api.transfer(&alice, &bob, Money::from_cents(2000), "Gift", None).await.unwrap_err();
        assert!(matches!(err, SettlementError::Database(ref m) if m.contains("ledger unavailable")), "got {err}");
        assert_eq!(api.balance(&alice).await.unwrap(), Money::from_cents(5000));
        assert_eq!(api.balance(&bob).await.unwrap(), Money::default());

        let history = api.statement(&alice).await.unwrap().transactions;
        let types: Vec<_> = history.iter().map(|t| t.tx_type).collect();
        assert_eq!(
            types,
            vec![WalletTransactionType::Reversal, WalletTransactionType::TransferOut, WalletTransactionType::TransferIn]
        );
        let debit_id = history[1].id;
        assert_eq!(history[0].amount, Money::from_cents(2000));
        assert_eq!(history[0].idempotency_key, Some(format!("reversal:{debit_id}")));
    }

    #[tokio::test]
    async fn unreversible_transfers_are_reported_as_inconsistent() {
        let api = refusing(funded_ledger().await, &["alice", "bob"]);
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));

        let err = api.transfer(&alice, &bob, Money::from_cents(2000), "Gift", None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InconsistentState(_)), "got {err}");
        assert_eq!(api.balance(&alice).await.unwrap(), Money::from_cents(3000));
    }
}
