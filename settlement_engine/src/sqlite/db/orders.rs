use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        ArtisanResponse,
        CostAbsorption,
        CourierDelivery,
        CourierStatus,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
    },
    traits::{OrderQueryFilter, OrderStoreError},
};
use settle_common::Rate;

/// Inserts the order and its items, returning `false` in the second parameter if the order already exists.
///
/// This is not atomic on its own. Call it inside a transaction, passing `&mut *tx` as the connection argument, so
/// that an order is never stored without its items.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderStoreError> {
    let order_id = order.order_id.clone();
    let items = order.items.clone();
    match insert_order_row(order, conn).await? {
        Some(inserted) => {
            insert_items(&order_id, &items, conn).await?;
            debug!("🗃️ Order [{order_id}] inserted with {} items", items.len());
            Ok((Order { items, ..inserted }, true))
        },
        None => {
            let existing = fetch_order(&order_id, conn).await?.ok_or(OrderStoreError::OrderNotFound(order_id))?;
            Ok((existing, false))
        },
    }
}

async fn insert_order_row(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let hold = order.payment_hold.as_ref();
    let pricing = order.delivery_pricing.as_ref();
    sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                is_guest,
                seller_id,
                payment_method,
                payment_status,
                hold_ref,
                hold_status,
                hold_amount,
                hold_authorized_at,
                hold_expires_at,
                subtotal,
                delivery_fee,
                total_amount,
                delivery_method,
                delivery_address,
                pricing_estimated_fee,
                pricing_buffer_bps,
                pricing_charged_amount,
                pricing_quote_id,
                pricing_quote_expiry,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $22)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.buyer_id)
    .bind(order.is_guest)
    .bind(order.seller_id)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(hold.map(|h| h.hold_ref.clone()))
    .bind(hold.map(|h| h.status))
    .bind(hold.map(|h| h.amount))
    .bind(hold.map(|h| h.authorized_at))
    .bind(hold.map(|h| h.expires_at))
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(order.delivery_method)
    .bind(order.delivery_address)
    .bind(pricing.map(|p| p.estimated_fee))
    .bind(pricing.map(|p| p.buffer_percentage))
    .bind(pricing.map(|p| p.charged_amount))
    .bind(pricing.and_then(|p| p.courier_quote_id.clone()))
    .bind(pricing.and_then(|p| p.courier_quote_expiry))
    .bind(order.created_at)
    .fetch_optional(conn)
    .await
}

async fn insert_items(order_id: &OrderId, items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new(
        "INSERT INTO order_items (order_id, position, product_id, quantity, unit_price, fulfillment_type, seller_id, \
         schedule_slot) ",
    );
    builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        #[allow(clippy::cast_possible_wrap)]
        row.push_bind(order_id.as_str())
            .push_bind(position as i64)
            .push_bind(item.product_id.as_str())
            .push_bind(item.quantity)
            .push_bind(item.unit_price)
            .push_bind(item.fulfillment_type)
            .push_bind(item.seller_id.as_ref().map(|s| s.as_str()))
            .push_bind(item.schedule_slot.as_deref());
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, quantity, unit_price, fulfillment_type, seller_id, schedule_slot FROM order_items WHERE \
         order_id = $1 ORDER BY position",
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await
}

async fn with_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_items(&order.order_id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

/// Returns the order with the given `order_id`, including its items.
pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

pub async fn fetch_order_by_delivery_id(
    delivery_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE courier_delivery_id = $1")
        .bind(delivery_id)
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

pub async fn transition_status(
    order_id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    reason: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = $3,
            status_reason = COALESCE($4, status_reason),
            fulfilled_at = CASE WHEN $3 IN ('delivered', 'picked_up') THEN CURRENT_TIMESTAMP ELSE fulfilled_at END,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status = $2
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(from)
    .bind(to)
    .bind(reason)
    .fetch_optional(&mut *conn)
    .await?;
    trace!("🗃️ Status change {from} -> {to} for order {order_id}: {}", if order.is_some() { "applied" } else { "skipped" });
    with_items(order, conn).await
}

pub async fn claim_capture(
    order_id: &OrderId,
    lease: Duration,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET capture_claimed_at = CURRENT_TIMESTAMP
        WHERE order_id = $1
          AND payment_status = 'authorized'
          AND (capture_claimed_at IS NULL OR unixepoch(capture_claimed_at) <= unixepoch('now') - $2)
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(lease.num_seconds())
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

pub async fn release_capture_claim(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET capture_claimed_at = NULL WHERE order_id = $1")
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_payment_captured(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_status = 'captured',
            hold_status = CASE WHEN hold_ref IS NULL THEN NULL ELSE 'captured' END,
            capture_claimed_at = NULL,
            last_settlement_error = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND payment_status = 'authorized'
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

pub async fn update_payment_status(
    order_id: &OrderId,
    from: PaymentStatus,
    to: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_status = $3,
            hold_status = CASE
                WHEN $3 IN ('refunded', 'failed') AND hold_status = 'held' THEN 'released'
                ELSE hold_status
            END,
            capture_claimed_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND payment_status = $2
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(from)
    .bind(to)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

pub async fn snapshot_commission_rate(
    order_id: &OrderId,
    rate: Rate,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let order = sqlx::query_as(
        "UPDATE orders SET commission_bps = COALESCE(commission_bps, $2) WHERE order_id = $1 RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(rate)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await?.ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
}

pub async fn record_settlement_error(
    order_id: &OrderId,
    error: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET last_settlement_error = $2 WHERE order_id = $1")
        .bind(order_id.as_str())
        .bind(error)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn record_payout_transfer(
    order_id: &OrderId,
    transfer_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET payout_transfer_ref = $2, updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND \
         payout_transfer_ref IS NULL",
    )
    .bind(order_id.as_str())
    .bind(transfer_ref)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_cost_absorption(
    order_id: &OrderId,
    absorption: &CostAbsorption,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            absorption_required = $2,
            absorption_excess = $3,
            absorption_actual_fee = $4,
            absorption_response = $5,
            absorption_responded_at = $6,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(absorption.required)
    .bind(absorption.excess_amount)
    .bind(absorption.actual_fee)
    .bind(absorption.artisan_response)
    .bind(absorption.responded_at)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await?.ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
}

pub async fn respond_to_cost_absorption(
    order_id: &OrderId,
    response: ArtisanResponse,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            absorption_response = $2,
            absorption_responded_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND absorption_required = TRUE AND absorption_response = 'pending'
        RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(response)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

/// Stores a new courier booking on an order that has none. Returns `None` if the order is already booked.
pub async fn book_courier_delivery(
    order_id: &OrderId,
    delivery: &CourierDelivery,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    write_courier_delivery(order_id, delivery, "courier_delivery_id IS NULL", conn).await
}

/// Overwrites the tracking details of the order's current booking.
pub async fn update_courier_delivery(
    order_id: &OrderId,
    delivery: &CourierDelivery,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    write_courier_delivery(order_id, delivery, "courier_delivery_id = $2", conn).await
}

async fn write_courier_delivery(
    order_id: &OrderId,
    delivery: &CourierDelivery,
    condition: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE orders SET
            courier_delivery_id = $2,
            courier_status = $3,
            courier_fee = $4,
            courier_tracking_url = $5,
            courier_name = $6,
            courier_pickup_eta = $7,
            courier_dropoff_eta = $8,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND {condition}
        RETURNING *;
        "#
    );
    let order = sqlx::query_as(&sql)
        .bind(order_id.as_str())
        .bind(delivery.delivery_id.as_str())
        .bind(delivery.status)
        .bind(delivery.fee)
        .bind(delivery.tracking_url.as_deref())
        .bind(delivery.courier_name.as_deref())
        .bind(delivery.pickup_eta)
        .bind(delivery.dropoff_eta)
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

pub async fn update_courier_status(
    delivery_id: &str,
    status: CourierStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET courier_status = $2, updated_at = CURRENT_TIMESTAMP WHERE courier_delivery_id = $1 \
         RETURNING *",
    )
    .bind(delivery_id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

/// Handed-over orders whose payment is still only authorized. Age counts from `fulfilled_at`, so failed capture
/// attempts and error records do not restart the clock.
pub async fn fetch_stale_authorized_orders(
    older_than: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE payment_status = 'authorized'
          AND status IN ('delivered', 'picked_up', 'completed')
          AND unixepoch(COALESCE(fulfilled_at, updated_at)) <= unixepoch('now') - $1
        ORDER BY fulfilled_at ASC;
        "#,
    )
    .bind(older_than.num_seconds())
    .fetch_all(&mut *conn)
    .await?;
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        if let Some(order) = with_items(Some(order), conn).await? {
            result.push(order);
        }
    }
    Ok(result)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id.0);
    }
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id.0);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if !query.payment_statuses.is_empty() {
        where_clause.push("payment_status IN (");
        for (i, status) in query.payment_statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders: Vec<Order> = builder.build_query_as().fetch_all(&mut *conn).await?;
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        if let Some(order) = with_items(Some(order), conn).await? {
            result.push(order);
        }
    }
    Ok(result)
}
