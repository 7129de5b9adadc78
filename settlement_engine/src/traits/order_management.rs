use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{ArtisanResponse, CostAbsorption, CourierDelivery, CourierStatus, NewOrder, Order, OrderId, OrderStatus, PaymentStatus},
    traits::OrderQueryFilter,
};
use settle_common::Rate;

/// Order persistence.
///
/// Every method that changes the lifecycle or payment state is a *conditional* update: it only takes effect if the
/// stored order is still in the expected prior state, and returns `None` otherwise. This is what makes concurrent
/// triggers (two requests confirming receipt, a webhook racing the sweep, and so on) resolve to a single winner.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order, including its items.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Stores a new order and its items in a single atomic transaction.
    /// This call is idempotent. Returns false in the second parameter if the order already existed.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;

    /// Moves the order from `from` to `to`, recording `reason` if given.
    /// Returns `None` if the order was not in status `from`.
    async fn transition_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Claims the right to capture this order's authorization. The claim succeeds only if the payment is still
    /// `authorized` and no other claim younger than `lease` exists. Returns the claimed order on success.
    async fn claim_capture(&self, order_id: &OrderId, lease: Duration) -> Result<Option<Order>, OrderStoreError>;

    /// Drops a capture claim without changing the payment status, e.g. after a retryable processor failure.
    async fn release_capture_claim(&self, order_id: &OrderId) -> Result<(), OrderStoreError>;

    /// Marks an authorized payment as captured: payment status `captured`, hold `captured`, claim and any recorded
    /// settlement error cleared. Returns `None` if the payment was not `authorized`.
    async fn mark_payment_captured(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Conditionally moves the payment status from `from` to `to`. Moving to `refunded` or `failed` also releases a
    /// live hold.
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Fixes the commission rate on the order if it has not been fixed yet, and returns the order with the rate
    /// that is now stored (which may be an earlier snapshot).
    async fn snapshot_commission_rate(&self, order_id: &OrderId, rate: Rate) -> Result<Order, OrderStoreError>;

    /// Records (or clears, with `None`) the last settlement failure for operators to inspect.
    async fn record_settlement_error(&self, order_id: &OrderId, error: Option<String>) -> Result<(), OrderStoreError>;

    /// Stores the payout transfer reference. Returns false if a reference was already stored.
    async fn record_payout_transfer(&self, order_id: &OrderId, transfer_ref: &str) -> Result<bool, OrderStoreError>;

    async fn set_cost_absorption(
        &self,
        order_id: &OrderId,
        absorption: &CostAbsorption,
    ) -> Result<Order, OrderStoreError>;

    /// Records the artisan's answer to a pending cost absorption request. Returns `None` if there is no pending
    /// request, so a second answer never wins.
    async fn respond_to_cost_absorption(
        &self,
        order_id: &OrderId,
        response: ArtisanResponse,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Attaches a new courier booking to an order. Returns `None` if the order already has one, in which case the
    /// caller's booking is surplus and should be cancelled with the courier.
    async fn book_courier_delivery(
        &self,
        order_id: &OrderId,
        delivery: &CourierDelivery,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Refreshes the status, tracking link, courier name or ETAs of the order's existing booking.
    async fn update_courier_delivery(
        &self,
        order_id: &OrderId,
        delivery: &CourierDelivery,
    ) -> Result<Order, OrderStoreError>;

    /// Updates the courier status of the order that owns `delivery_id`.
    async fn update_courier_status(
        &self,
        delivery_id: &str,
        status: CourierStatus,
    ) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_by_delivery_id(&self, delivery_id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Orders that have been fulfilled or completed but whose payment is still only `authorized`, and which were
    /// handed over at least `older_than` ago.
    async fn fetch_stale_authorized_orders(&self, older_than: Duration) -> Result<Vec<Order>, OrderStoreError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid order data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
