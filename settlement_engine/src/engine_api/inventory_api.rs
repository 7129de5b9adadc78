use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, OrderItem, Product, ProductId, ScheduleSlot},
    engine_api::errors::SettlementError,
    traits::{InventoryManagement, ReservationLine},
};

/// `InventoryApi` reserves stock when an order is placed and gives it back when the order is cancelled or declined.
///
/// Restoration is not idempotent here. Callers must only restore once per order, which the order flow guarantees by
/// restoring only after winning the (single) transition into a terminal state.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B: Clone> Clone for InventoryApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

pub fn reservation_lines(items: &[OrderItem]) -> Vec<ReservationLine> {
    items
        .iter()
        .map(|item| ReservationLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            fulfillment_type: item.fulfillment_type,
            schedule_slot: item.schedule_slot.clone(),
            seller_id: item.seller_id.clone(),
        })
        .collect()
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    /// Reserves every item of an order, or nothing at all.
    pub async fn reserve(&self, items: &[OrderItem]) -> Result<(), SettlementError> {
        let lines = reservation_lines(items);
        self.db.reserve(&lines).await.map_err(|e| {
            debug!("📦️ Reservation refused: {e}");
            SettlementError::from(e)
        })?;
        debug!("📦️ Reserved inventory for {} lines", lines.len());
        Ok(())
    }

    pub async fn restore(&self, items: &[OrderItem]) -> Result<(), SettlementError> {
        let lines = reservation_lines(items);
        self.db.restore(&lines).await?;
        debug!("📦️ Restored inventory for {} lines", lines.len());
        Ok(())
    }

    pub async fn product(&self, product_id: &ProductId) -> Result<Option<Product>, SettlementError> {
        Ok(self.db.fetch_product(product_id).await?)
    }

    pub async fn slots(&self, product_id: &ProductId) -> Result<Vec<ScheduleSlot>, SettlementError> {
        Ok(self.db.fetch_slots(product_id).await?)
    }

    pub async fn upsert_product(&self, product: NewProduct) -> Result<Product, SettlementError> {
        if product.stock < 0 || product.available_quantity < 0 || product.production_capacity < 0 {
            return Err(SettlementError::Validation("Inventory counters cannot be negative".into()));
        }
        if product.slots.iter().any(|(_, q)| *q < 0) {
            return Err(SettlementError::Validation("Slot availability cannot be negative".into()));
        }
        let product = self.db.upsert_product(product).await?;
        info!("📦️ Inventory for {} updated. Status: {}", product.product_id, product.status);
        Ok(product)
    }
}
