use thiserror::Error;

use crate::db_types::{AccountId, FulfillmentType, NewProduct, Product, ProductId, ScheduleSlot};

/// One line of a reservation or restoration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// The type the order declares. Reservations are refused unless it matches the product's stored type.
    pub fulfillment_type: FulfillmentType,
    pub schedule_slot: Option<String>,
    /// When set, the product must belong to this seller.
    pub seller_id: Option<AccountId>,
}

/// Stock, production capacity and schedule slot bookkeeping.
///
/// The counter that governs availability depends on the product's stored fulfillment type:
/// * `ready_to_ship`: both `stock` and `available_quantity` are decremented.
/// * `made_to_order`: `production_capacity` is decremented.
/// * `scheduled_order`: the slot's `available_quantity`, or the product's `available_quantity` if no slot is given.
///
/// A product is marked `out_of_stock` when its governing counter reaches zero, and `active` again when a restore
/// brings it back above zero.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Reserves every line, or none of them.
    async fn reserve(&self, lines: &[ReservationLine]) -> Result<(), InventoryError>;

    /// Reverses a previous reservation.
    async fn restore(&self, lines: &[ReservationLine]) -> Result<(), InventoryError>;

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, InventoryError>;

    async fn fetch_slots(&self, product_id: &ProductId) -> Result<Vec<ScheduleSlot>, InventoryError>;

    /// Creates or replaces a product's inventory record.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Product {0} is not available for sale")]
    ProductInactive(ProductId),
    #[error("Insufficient availability for {product}: requested {requested}, available {available}")]
    InsufficientStock { product: ProductId, requested: i64, available: i64 },
    #[error("Schedule slot {slot} does not exist for product {product}")]
    SlotNotFound { product: ProductId, slot: String },
    #[error("Product {product} is sold as {stored}, not {declared}")]
    FulfillmentMismatch { product: ProductId, declared: FulfillmentType, stored: FulfillmentType },
    #[error("Product {product} is not sold by {seller}")]
    SellerMismatch { product: ProductId, seller: AccountId },
    #[error("Quantities must be positive. Got {0}")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}
