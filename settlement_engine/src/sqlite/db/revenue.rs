use log::{debug, info};
use sqlx::SqliteConnection;

use crate::{
    db_types::{platform_account, AccountId, LedgerEntry, OrderId, RevenueRecord, WalletTransactionType},
    sqlite::db::wallets,
    traits::{RevenueError, RevenueRecognition},
};

pub async fn fetch_revenue_record(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<RevenueRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM revenue_records WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_revenue_for_seller(
    seller_id: &AccountId,
    conn: &mut SqliteConnection,
) -> Result<Vec<RevenueRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM revenue_records WHERE seller_id = $1 ORDER BY recognized_at ASC")
        .bind(seller_id.as_str())
        .fetch_all(conn)
        .await
}

async fn insert_record(record: &RevenueRecord, conn: &mut SqliteConnection) -> Result<Option<RevenueRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO revenue_records (
            order_id,
            seller_id,
            subtotal,
            delivery_fee,
            total_amount,
            platform_fee,
            processing_fee,
            delivery_deduction,
            net_amount,
            commission_bps,
            order_created_at,
            recognized_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (order_id) DO NOTHING
        RETURNING *;
        "#,
    )
    .bind(record.order_id.as_str())
    .bind(record.seller_id.as_str())
    .bind(record.subtotal)
    .bind(record.delivery_fee)
    .bind(record.total_amount)
    .bind(record.platform_fee)
    .bind(record.processing_fee)
    .bind(record.delivery_deduction)
    .bind(record.net_amount)
    .bind(record.commission_bps)
    .bind(record.order_created_at)
    .bind(record.recognized_at)
    .fetch_optional(conn)
    .await
}

/// Stores the revenue record and applies the matching ledger credits. Not atomic on its own; run it inside a
/// transaction so that the record and the credits land together or not at all.
pub async fn recognize_revenue(
    record: RevenueRecord,
    conn: &mut SqliteConnection,
) -> Result<RevenueRecognition, RevenueError> {
    if record.net_amount.is_negative() {
        return Err(RevenueError::InvalidRecord(format!(
            "Net amount for order {} is negative ({})",
            record.order_id, record.net_amount
        )));
    }
    let Some(stored) = insert_record(&record, conn).await? else {
        debug!("🗃️ Revenue for order {} was already recognized", record.order_id);
        let existing = fetch_revenue_record(&record.order_id, conn).await?.ok_or_else(|| {
            RevenueError::DatabaseError(format!("Revenue record for {} vanished", record.order_id))
        })?;
        return Ok(RevenueRecognition { record: existing, seller_credit: None, newly_recognized: false });
    };
    let record = stored;
    let mut seller_credit = None;
    if record.net_amount.is_positive() {
        let entry = LedgerEntry::new(
            record.seller_id.clone(),
            record.net_amount,
            WalletTransactionType::Earning,
            format!("Earnings for order {}", record.order_id),
        )
        .for_order(&record.order_id)
        .with_idempotency_key(format!("earning:{}", record.order_id))
        .with_metadata(serde_json::json!({
            "total_amount": record.total_amount,
            "platform_fee": record.platform_fee,
            "processing_fee": record.processing_fee,
            "delivery_deduction": record.delivery_deduction,
        }));
        let (tx, _) = wallets::credit(&entry, conn).await.map_err(|e| RevenueError::DatabaseError(e.to_string()))?;
        seller_credit = Some(tx);
    }
    if record.platform_fee.is_positive() {
        let entry = LedgerEntry::new(
            platform_account(),
            record.platform_fee,
            WalletTransactionType::PlatformFee,
            format!("Commission on order {}", record.order_id),
        )
        .for_order(&record.order_id)
        .with_idempotency_key(format!("platform-fee:{}", record.order_id));
        wallets::credit(&entry, conn).await.map_err(|e| RevenueError::DatabaseError(e.to_string()))?;
    }
    info!(
        "🗃️ Revenue recognized for order {}: net {} to seller {}, platform fee {}",
        record.order_id, record.net_amount, record.seller_id, record.platform_fee
    );
    Ok(RevenueRecognition { record, seller_credit, newly_recognized: true })
}
