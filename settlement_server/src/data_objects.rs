use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settle_common::Money;
use settlement_engine::{
    db_types::{AccountId, FulfillmentType, NewProduct, OrderStatus, PaymentStatus, ProductId},
    traits::OrderQueryFilter,
    SweepEntry,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `PUT /orders/{id}/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub buyer_id: AccountId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `PUT /orders/{id}/confirm-receipt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReceiptRequest {
    pub buyer_id: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDestinationRequest {
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuoteRequest {
    pub seller_id: AccountId,
    pub buyer_id: AccountId,
    pub dropoff_address: String,
    pub order_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCapacity {
    pub slot_id: String,
    pub capacity: i64,
}

/// Body of `PUT /products/{id}`. Replaces the product's stock, capacity and schedule slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub seller_id: AccountId,
    pub fulfillment_type: FulfillmentType,
    #[serde(default)]
    pub stock: i64,
    /// Defaults to `stock`.
    #[serde(default)]
    pub available_quantity: Option<i64>,
    #[serde(default)]
    pub production_capacity: i64,
    #[serde(default)]
    pub slots: Vec<SlotCapacity>,
}

impl ProductUpdate {
    pub fn into_new_product(self, product_id: ProductId) -> NewProduct {
        NewProduct {
            product_id,
            seller_id: self.seller_id,
            fulfillment_type: self.fulfillment_type,
            stock: self.stock,
            available_quantity: self.available_quantity.unwrap_or(self.stock),
            production_capacity: self.production_capacity,
            slots: self.slots.into_iter().map(|s| (s.slot_id, s.capacity)).collect(),
        }
    }
}

/// Query string of `GET /orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchParams {
    #[serde(default)]
    pub buyer_id: Option<AccountId>,
    #[serde(default)]
    pub seller_id: Option<AccountId>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl From<OrderSearchParams> for OrderQueryFilter {
    fn from(params: OrderSearchParams) -> Self {
        let mut filter = OrderQueryFilter::default();
        if let Some(buyer_id) = params.buyer_id {
            filter = filter.with_buyer_id(buyer_id);
        }
        if let Some(seller_id) = params.seller_id {
            filter = filter.with_seller_id(seller_id);
        }
        if let Some(status) = params.status {
            filter = filter.with_status(status);
        }
        if let Some(status) = params.payment_status {
            filter = filter.with_payment_status(status);
        }
        filter
    }
}

/// Query string of `POST /orders/auto-capture-payments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepParams {
    /// Overrides the configured auto-capture age.
    #[serde(default)]
    pub older_than_hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub processed: usize,
    pub results: Vec<SweepEntry>,
}

impl From<Vec<SweepEntry>> for SweepResponse {
    fn from(results: Vec<SweepEntry>) -> Self {
        Self { processed: results.len(), results }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn product_update_defaults_available_quantity_to_stock() {
        let json = r#"{"sellerId":"potter","fulfillmentType":"ready_to_ship","stock":4}"#;
        let update: ProductUpdate = serde_json::from_str(json).unwrap();
        let product = update.into_new_product(ProductId::from("vase"));
        assert_eq!(product.available_quantity, 4);
        assert!(product.slots.is_empty());
    }

    #[test]
    fn search_params_become_a_filter() {
        let params = OrderSearchParams {
            seller_id: Some(AccountId::from("potter")),
            status: Some(OrderStatus::Pending),
            ..Default::default()
        };
        let filter = OrderQueryFilter::from(params);
        assert_eq!(filter.seller_id, Some(AccountId::from("potter")));
        assert_eq!(filter.statuses, vec![OrderStatus::Pending]);
        assert!(filter.buyer_id.is_none());
        assert!(filter.payment_statuses.is_empty());
    }
}
