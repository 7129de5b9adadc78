use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AccountId, OrderStatus, PaymentStatus, RevenueRecord, WalletTransaction};

/// Criteria for [`crate::traits::OrderManagement::search_orders`]. Empty fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub buyer_id: Option<AccountId>,
    pub seller_id: Option<AccountId>,
    #[serde(default)]
    pub statuses: Vec<OrderStatus>,
    #[serde(default)]
    pub payment_statuses: Vec<PaymentStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none()
            && self.seller_id.is_none()
            && self.statuses.is_empty()
            && self.payment_statuses.is_empty()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_seller_id(mut self, seller_id: AccountId) -> Self {
        self.seller_id = Some(seller_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: AccountId) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_statuses.push(status);
        self
    }
}

/// The outcome of [`crate::traits::RevenueManagement::recognize_revenue`].
#[derive(Debug, Clone)]
pub struct RevenueRecognition {
    pub record: RevenueRecord,
    /// The seller earning credit. `None` when the net amount was zero.
    pub seller_credit: Option<WalletTransaction>,
    /// False if the order had already been recognized; nothing was written in that case.
    pub newly_recognized: bool,
}
