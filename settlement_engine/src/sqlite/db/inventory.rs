use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{FulfillmentType, NewProduct, Product, ProductId, ProductStatus, ScheduleSlot},
    traits::{InventoryError, ReservationLine},
};

pub async fn fetch_product(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE product_id = $1")
        .bind(product_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_slots(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Vec<ScheduleSlot>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM schedule_slots WHERE product_id = $1 ORDER BY slot_id")
        .bind(product_id.as_str())
        .fetch_all(conn)
        .await
}

async fn fetch_slot(
    product_id: &ProductId,
    slot_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ScheduleSlot>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM schedule_slots WHERE product_id = $1 AND slot_id = $2")
        .bind(product_id.as_str())
        .bind(slot_id)
        .fetch_optional(conn)
        .await
}

/// Loads the product a line refers to and checks the line against the stored record. The buyer's cart only declares
/// a fulfillment type; the stored one selects the counter.
async fn product_for_line(line: &ReservationLine, conn: &mut SqliteConnection) -> Result<Product, InventoryError> {
    let product = fetch_product(&line.product_id, conn)
        .await?
        .ok_or_else(|| InventoryError::ProductNotFound(line.product_id.clone()))?;
    if product.fulfillment_type != line.fulfillment_type {
        return Err(InventoryError::FulfillmentMismatch {
            product: line.product_id.clone(),
            declared: line.fulfillment_type,
            stored: product.fulfillment_type,
        });
    }
    if let Some(seller) = line.seller_id.as_ref().filter(|s| **s != product.seller_id) {
        return Err(InventoryError::SellerMismatch { product: line.product_id.clone(), seller: seller.clone() });
    }
    Ok(product)
}

/// Decrements the governing counter for a single line. Not atomic across lines; run it inside a transaction and roll
/// back on the first error.
pub async fn reserve_line(line: &ReservationLine, conn: &mut SqliteConnection) -> Result<(), InventoryError> {
    if line.quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(line.quantity));
    }
    let product = product_for_line(line, conn).await?;
    let kind = product.fulfillment_type;
    let pid = line.product_id.as_str();
    let rows = match (kind, line.schedule_slot.as_deref()) {
        (FulfillmentType::ReadyToShip, _) => sqlx::query(
            r#"
            UPDATE products SET
                stock = stock - $2,
                available_quantity = available_quantity - $2,
                status = CASE WHEN MIN(stock, available_quantity) - $2 <= 0 THEN 'out_of_stock' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND fulfillment_type = $3 AND status <> 'inactive'
              AND stock >= $2 AND available_quantity >= $2
            "#,
        )
        .bind(pid)
        .bind(line.quantity)
        .bind(kind)
        .execute(&mut *conn)
        .await?
        .rows_affected(),
        (FulfillmentType::MadeToOrder, _) => sqlx::query(
            r#"
            UPDATE products SET
                production_capacity = production_capacity - $2,
                status = CASE WHEN production_capacity - $2 <= 0 THEN 'out_of_stock' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND fulfillment_type = $3 AND status <> 'inactive' AND production_capacity >= $2
            "#,
        )
        .bind(pid)
        .bind(line.quantity)
        .bind(kind)
        .execute(&mut *conn)
        .await?
        .rows_affected(),
        (FulfillmentType::ScheduledOrder, Some(slot)) => {
            if product.status == ProductStatus::Inactive {
                return Err(InventoryError::ProductInactive(line.product_id.clone()));
            }
            let rows = sqlx::query(
                "UPDATE schedule_slots SET available_quantity = available_quantity - $3 WHERE product_id = $1 AND \
                 slot_id = $2 AND available_quantity >= $3",
            )
            .bind(pid)
            .bind(slot)
            .bind(line.quantity)
            .execute(&mut *conn)
            .await?
            .rows_affected();
            if rows > 0 {
                sqlx::query(
                    r#"
                    UPDATE products SET
                        status = CASE
                            WHEN (SELECT COALESCE(SUM(available_quantity), 0) FROM schedule_slots WHERE product_id = $1) = 0
                            THEN 'out_of_stock' ELSE status END,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE product_id = $1
                    "#,
                )
                .bind(pid)
                .execute(&mut *conn)
                .await?;
            }
            rows
        },
        (FulfillmentType::ScheduledOrder, None) => sqlx::query(
            r#"
            UPDATE products SET
                available_quantity = available_quantity - $2,
                status = CASE WHEN available_quantity - $2 <= 0 THEN 'out_of_stock' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND fulfillment_type = $3 AND status <> 'inactive' AND available_quantity >= $2
            "#,
        )
        .bind(pid)
        .bind(line.quantity)
        .bind(kind)
        .execute(&mut *conn)
        .await?
        .rows_affected(),
    };
    if rows == 0 {
        return Err(reservation_failure(line, kind, conn).await);
    }
    trace!("🗃️ Reserved {} x {} ({kind})", line.quantity, line.product_id);
    Ok(())
}

/// Works out why a reservation matched no rows.
async fn reservation_failure(
    line: &ReservationLine,
    kind: FulfillmentType,
    conn: &mut SqliteConnection,
) -> InventoryError {
    let product = match fetch_product(&line.product_id, conn).await {
        Ok(Some(p)) => p,
        Ok(None) => return InventoryError::ProductNotFound(line.product_id.clone()),
        Err(e) => return e.into(),
    };
    if product.status == ProductStatus::Inactive {
        return InventoryError::ProductInactive(line.product_id.clone());
    }
    let available = match (kind, line.schedule_slot.as_deref()) {
        (FulfillmentType::ReadyToShip, _) => product.stock.min(product.available_quantity),
        (FulfillmentType::MadeToOrder, _) => product.production_capacity,
        (FulfillmentType::ScheduledOrder, Some(slot)) => match fetch_slot(&line.product_id, slot, conn).await {
            Ok(Some(s)) => s.available_quantity,
            Ok(None) => {
                return InventoryError::SlotNotFound { product: line.product_id.clone(), slot: slot.to_string() }
            },
            Err(e) => return e.into(),
        },
        (FulfillmentType::ScheduledOrder, None) => product.available_quantity,
    };
    InventoryError::InsufficientStock { product: line.product_id.clone(), requested: line.quantity, available }
}

/// Gives back a previously reserved line and reactivates the product if it had sold out. The counter is chosen by
/// the product's stored fulfillment type.
pub async fn restore_line(line: &ReservationLine, conn: &mut SqliteConnection) -> Result<(), InventoryError> {
    if line.quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(line.quantity));
    }
    let product = fetch_product(&line.product_id, conn)
        .await?
        .ok_or_else(|| InventoryError::ProductNotFound(line.product_id.clone()))?;
    let kind = product.fulfillment_type;
    let pid = line.product_id.as_str();
    let slot = line.schedule_slot.as_deref().filter(|_| kind == FulfillmentType::ScheduledOrder);
    if let Some(slot) = slot {
        let rows = sqlx::query(
            "UPDATE schedule_slots SET available_quantity = available_quantity + $3 WHERE product_id = $1 AND slot_id \
             = $2",
        )
        .bind(pid)
        .bind(slot)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(InventoryError::SlotNotFound { product: line.product_id.clone(), slot: slot.to_string() });
        }
    }
    let set_clause = match (kind, slot.is_some()) {
        (FulfillmentType::ReadyToShip, _) => "stock = stock + $2, available_quantity = available_quantity + $2,",
        (FulfillmentType::MadeToOrder, _) => "production_capacity = production_capacity + $2,",
        (FulfillmentType::ScheduledOrder, false) => "available_quantity = available_quantity + $2,",
        (FulfillmentType::ScheduledOrder, true) => "",
    };
    let sql = format!(
        "UPDATE products SET {set_clause} status = CASE WHEN status = 'out_of_stock' THEN 'active' ELSE status END, \
         updated_at = CURRENT_TIMESTAMP WHERE product_id = $1 AND $2 > 0"
    );
    sqlx::query(&sql).bind(pid).bind(line.quantity).execute(&mut *conn).await?;
    trace!("🗃️ Restored {} x {} ({kind})", line.quantity, line.product_id);
    Ok(())
}

pub async fn upsert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, InventoryError> {
    let governing = match product.fulfillment_type {
        FulfillmentType::ReadyToShip => product.stock.min(product.available_quantity),
        FulfillmentType::MadeToOrder => product.production_capacity,
        FulfillmentType::ScheduledOrder if !product.slots.is_empty() => product.slots.iter().map(|(_, q)| *q).sum(),
        FulfillmentType::ScheduledOrder => product.available_quantity,
    };
    let status = if governing > 0 { ProductStatus::Active } else { ProductStatus::OutOfStock };
    let stored: Product = sqlx::query_as(
        r#"
        INSERT INTO products (product_id, seller_id, fulfillment_type, stock, available_quantity, production_capacity, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (product_id) DO UPDATE SET
            seller_id = excluded.seller_id,
            fulfillment_type = excluded.fulfillment_type,
            stock = excluded.stock,
            available_quantity = excluded.available_quantity,
            production_capacity = excluded.production_capacity,
            status = excluded.status,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *;
        "#,
    )
    .bind(product.product_id.as_str())
    .bind(product.seller_id.as_str())
    .bind(product.fulfillment_type)
    .bind(product.stock)
    .bind(product.available_quantity)
    .bind(product.production_capacity)
    .bind(status)
    .fetch_one(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM schedule_slots WHERE product_id = $1")
        .bind(product.product_id.as_str())
        .execute(&mut *conn)
        .await?;
    for (slot_id, quantity) in &product.slots {
        sqlx::query("INSERT INTO schedule_slots (product_id, slot_id, available_quantity) VALUES ($1, $2, $3)")
            .bind(product.product_id.as_str())
            .bind(slot_id.as_str())
            .bind(*quantity)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Product {} stored with status {}", stored.product_id, stored.status);
    Ok(stored)
}
