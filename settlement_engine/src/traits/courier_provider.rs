use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{AccountId, CourierStatus, OrderId};
use settle_common::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub order_id: Option<OrderId>,
    pub seller_id: AccountId,
    pub buyer_id: AccountId,
    pub dropoff_address: String,
    pub order_value: Money,
    /// A quote to honour, if the provider still accepts it.
    pub quote_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierQuote {
    pub quote_id: String,
    pub fee: Money,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryBooking {
    pub delivery_id: String,
    pub fee: Money,
    pub status: CourierStatus,
    pub tracking_url: Option<String>,
    pub courier_name: Option<String>,
    pub pickup_eta: Option<DateTime<Utc>>,
    pub dropoff_eta: Option<DateTime<Utc>>,
}

/// The on-demand courier service used for professional deliveries.
#[allow(async_fn_in_trait)]
pub trait CourierProvider {
    async fn quote(&self, request: &DeliveryRequest) -> Result<CourierQuote, CourierError>;

    /// Books a courier. The order id is passed to the provider as an idempotency key.
    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryBooking, CourierError>;

    async fn get_status(&self, delivery_id: &str) -> Result<DeliveryBooking, CourierError>;

    async fn cancel(&self, delivery_id: &str) -> Result<(), CourierError>;
}

#[derive(Debug, Clone, Error)]
pub enum CourierError {
    #[error("The delivery address is not serviceable: {0}")]
    Unserviceable(String),
    #[error("Delivery {0} is unknown to the courier")]
    DeliveryNotFound(String),
    #[error("Temporary courier failure: {0}")]
    Retryable(String),
    #[error("Courier failure: {0}")]
    Fatal(String),
}
