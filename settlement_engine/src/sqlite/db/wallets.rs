use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{AccountId, LedgerEntry, OrderId, WalletAccount, WalletTransaction},
    traits::WalletError,
};
use settle_common::{Money, DEFAULT_CURRENCY_CODE};

pub async fn fetch_wallet(
    account_id: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_accounts WHERE account_id = $1")
        .bind(account_id.as_str())
        .fetch_optional(conn)
        .await
}

/// Makes sure a wallet row exists for the account. Wallets are created implicitly, with a zero balance.
async fn ensure_wallet(account_id: &AccountId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let result = sqlx::query("INSERT INTO wallet_accounts (account_id, currency) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(account_id.as_str())
        .bind(DEFAULT_CURRENCY_CODE)
        .execute(conn)
        .await?;
    if result.rows_affected() > 0 {
        debug!("🗃️ Created wallet for account {account_id}");
    }
    Ok(())
}

pub async fn fetch_transaction_by_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_transactions WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await
}

/// Appends the transaction row. Returns `None` if an entry with the same idempotency key already exists.
async fn append_transaction(
    entry: &LedgerEntry,
    signed_amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    let metadata = entry.metadata.as_ref().map(|m| m.to_string());
    sqlx::query_as(
        r#"
        INSERT INTO wallet_transactions (account_id, tx_type, amount, description, related_order_id, idempotency_key, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING *;
        "#,
    )
    .bind(entry.account_id.as_str())
    .bind(entry.tx_type)
    .bind(signed_amount)
    .bind(entry.description.as_str())
    .bind(entry.related_order_id.as_ref().map(|o| o.as_str()))
    .bind(entry.idempotency_key.as_deref())
    .bind(metadata)
    .fetch_optional(conn)
    .await
}

async fn existing_for_key(entry: &LedgerEntry, conn: &mut SqliteConnection) -> Result<WalletTransaction, WalletError> {
    let key = entry.idempotency_key.as_deref().unwrap_or_default();
    fetch_transaction_by_key(key, conn)
        .await?
        .ok_or_else(|| WalletError::DatabaseError(format!("Ledger entry with key {key} vanished")))
}

/// Credits the account. Not atomic on its own; run it inside a transaction.
pub async fn credit(
    entry: &LedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<(WalletTransaction, bool), WalletError> {
    if !entry.amount.is_positive() {
        return Err(WalletError::InvalidAmount(entry.amount));
    }
    ensure_wallet(&entry.account_id, conn).await?;
    let Some(tx) = append_transaction(entry, entry.amount, conn).await? else {
        trace!("🗃️ Credit for {} already applied", entry.account_id);
        return Ok((existing_for_key(entry, conn).await?, false));
    };
    sqlx::query("UPDATE wallet_accounts SET balance = balance + $2, updated_at = CURRENT_TIMESTAMP WHERE account_id = $1")
        .bind(entry.account_id.as_str())
        .bind(entry.amount)
        .execute(conn)
        .await?;
    debug!("🗃️ Credited {} to wallet {} ({})", entry.amount, entry.account_id, entry.tx_type);
    Ok((tx, true))
}

/// Debits the account if, and only if, the balance covers the amount. Not atomic on its own; run it inside a
/// transaction and roll back on error.
pub async fn debit(entry: &LedgerEntry, conn: &mut SqliteConnection) -> Result<(WalletTransaction, bool), WalletError> {
    if !entry.amount.is_positive() {
        return Err(WalletError::InvalidAmount(entry.amount));
    }
    ensure_wallet(&entry.account_id, conn).await?;
    let Some(tx) = append_transaction(entry, -entry.amount, conn).await? else {
        trace!("🗃️ Debit for {} already applied", entry.account_id);
        return Ok((existing_for_key(entry, conn).await?, false));
    };
    let result = sqlx::query(
        "UPDATE wallet_accounts SET balance = balance - $2, updated_at = CURRENT_TIMESTAMP WHERE account_id = $1 AND \
         balance >= $2",
    )
    .bind(entry.account_id.as_str())
    .bind(entry.amount)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        let balance = fetch_wallet(&entry.account_id, conn).await?.map(|w| w.balance).unwrap_or_default();
        return Err(WalletError::InsufficientFunds {
            account: entry.account_id.clone(),
            balance,
            requested: entry.amount,
        });
    }
    debug!("🗃️ Debited {} from wallet {} ({})", entry.amount, entry.account_id, entry.tx_type);
    Ok((tx, true))
}

pub async fn fetch_transactions(
    account_id: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_transactions WHERE account_id = $1 ORDER BY id DESC")
        .bind(account_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn fetch_transactions_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_transactions WHERE related_order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn fetch_payout_destination(
    account_id: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Option<String>, sqlx::Error> {
    let destination: Option<Option<String>> =
        sqlx::query_scalar("SELECT payout_destination FROM wallet_accounts WHERE account_id = $1")
            .bind(account_id.as_str())
            .fetch_optional(conn)
            .await?;
    Ok(destination.flatten())
}

pub async fn set_payout_destination(
    account_id: &AccountId,
    destination: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO wallet_accounts (account_id, currency, payout_destination) VALUES ($1, $2, $3)
        ON CONFLICT (account_id) DO UPDATE SET payout_destination = excluded.payout_destination,
            updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(account_id.as_str())
    .bind(DEFAULT_CURRENCY_CODE)
    .bind(destination)
    .execute(conn)
    .await?;
    Ok(())
}
