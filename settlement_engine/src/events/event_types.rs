use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AccountId, Order, OrderId, OrderStatus, RevenueRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatus,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatus) -> Self {
        Self { order, old_status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueRecognizedEvent {
    pub record: RevenueRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderConfirmed,
    OrderDeclined,
    OrderCancelled,
    OrderPreparing,
    OrderReadyForPickup,
    OrderOutForDelivery,
    OrderDelivered,
    OrderCompleted,
    RefundIssued,
    DeliveryRefundIssued,
    /// The courier quote came in above what the buyer paid; the artisan must accept or decline the difference.
    DeliveryCostApprovalRequired,
    PayoutSent,
    /// A settlement step could not complete and needs an operator.
    SettlementAttentionRequired,
}

impl NotificationKind {
    /// The notification a participant receives when an order enters `status`.
    pub fn for_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Pending => Some(Self::OrderPlaced),
            OrderStatus::Confirmed => Some(Self::OrderConfirmed),
            OrderStatus::Preparing => Some(Self::OrderPreparing),
            OrderStatus::ReadyForPickup => Some(Self::OrderReadyForPickup),
            OrderStatus::ReadyForDelivery => None,
            OrderStatus::OutForDelivery => Some(Self::OrderOutForDelivery),
            OrderStatus::Delivered | OrderStatus::PickedUp => Some(Self::OrderDelivered),
            OrderStatus::Completed => Some(Self::OrderCompleted),
            OrderStatus::Cancelled => Some(Self::OrderCancelled),
            OrderStatus::Declined => Some(Self::OrderDeclined),
        }
    }
}

/// A message for a marketplace participant. Best effort: notification failures never affect the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: AccountId,
    pub kind: NotificationKind,
    pub order_id: Option<OrderId>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(recipient: AccountId, kind: NotificationKind, order_id: Option<OrderId>, payload: serde_json::Value) -> Self {
        Self { recipient, kind, order_id, payload, created_at: Utc::now() }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderStatusChanged(OrderStatusChangedEvent),
    RevenueRecognized(RevenueRecognizedEvent),
    Notification(NotificationEvent),
}
