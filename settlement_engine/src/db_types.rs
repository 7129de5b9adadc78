//! Data types shared by the settlement engine and its storage backends.
//!
//! Amounts are always [`Money`] (integer minor units) and percentages are always [`Rate`] (basis points). Nested order
//! records (payment hold, delivery pricing, cost absorption, courier delivery) are flattened into columns by the
//! storage layer, so the `Order` type implements `FromRow` by hand.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::{Money, Rate};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `as_str`, `Display` and `FromStr` for a fieldless enum from a single name table.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(ConversionError::new($kind, other)),
                }
            }
        }
    };
}

//--------------------------------------     Identifiers      ---------------------------------------------------------
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(id: S) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(OrderId);
string_id!(AccountId);
string_id!(ProductId);

impl OrderId {
    /// Generates a fresh, random order id of the form `ord_<16 hex chars>`.
    pub fn random() -> Self {
        Self(format!("ord_{:016x}", rand::random::<u64>()))
    }
}

/// The account that collects platform fees in the internal ledger.
pub fn platform_account() -> AccountId {
    AccountId::from("platform")
}

//--------------------------------------     OrderStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created and awaiting the artisan's confirmation.
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    ReadyForDelivery,
    OutForDelivery,
    Delivered,
    PickedUp,
    /// Terminal. Revenue is recognized on entry.
    Completed,
    /// Terminal. Cancelled by the buyer, the artisan, or a failed delivery negotiation.
    Cancelled,
    /// Terminal. The artisan declined the order.
    Declined,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Preparing => "preparing",
    ReadyForPickup => "ready_for_pickup",
    ReadyForDelivery => "ready_for_delivery",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    PickedUp => "picked_up",
    Completed => "completed",
    Cancelled => "cancelled",
    Declined => "declined",
});

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Declined)
    }

    /// The order has been handed over to the buyer, either in person or by a courier.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Delivered | Self::PickedUp)
    }

    /// Whether the lifecycle table permits moving from `self` to `next`. Once confirmed, an order can only be
    /// cancelled when the artisan refuses the extra cost of a courier.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed | Declined | Cancelled) => true,
            (Confirmed, Preparing) => true,
            (Preparing, ReadyForPickup | ReadyForDelivery) => true,
            (ReadyForPickup, PickedUp) => true,
            (ReadyForDelivery, OutForDelivery | Cancelled) => true,
            (OutForDelivery, Delivered) => true,
            (Delivered | PickedUp, Completed) => true,
            _ => false,
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the external processor. Funds are authorized at checkout and captured later.
    ProcessorCard,
    /// Paid from the buyer's internal wallet balance at checkout.
    InternalWallet,
}

string_enum!(PaymentMethod, "payment method", {
    ProcessorCard => "processor_card",
    InternalWallet => "internal_wallet",
});

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Paid,
    Captured,
    Refunded,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Authorized => "authorized",
    Paid => "paid",
    Captured => "captured",
    Refunded => "refunded",
    Failed => "failed",
});

impl PaymentStatus {
    /// Funds have actually been collected from the buyer.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Captured)
    }
}

//--------------------------------------     HoldStatus        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Held,
    Captured,
    Released,
}

string_enum!(HoldStatus, "hold status", {
    Held => "held",
    Captured => "captured",
    Released => "released",
});

//--------------------------------------    DeliveryMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMethod {
    Pickup,
    PersonalDelivery,
    ProfessionalDelivery,
}

string_enum!(DeliveryMethod, "delivery method", {
    Pickup => "pickup",
    PersonalDelivery => "personal_delivery",
    ProfessionalDelivery => "professional_delivery",
});

//--------------------------------------   FulfillmentType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Governed by physical stock.
    ReadyToShip,
    /// Governed by the artisan's production capacity.
    MadeToOrder,
    /// Governed by per-slot availability.
    ScheduledOrder,
}

string_enum!(FulfillmentType, "fulfillment type", {
    ReadyToShip => "ready_to_ship",
    MadeToOrder => "made_to_order",
    ScheduledOrder => "scheduled_order",
});

//--------------------------------------    ProductStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    OutOfStock,
    Inactive,
}

string_enum!(ProductStatus, "product status", {
    Active => "active",
    OutOfStock => "out_of_stock",
    Inactive => "inactive",
});

//--------------------------------------   ArtisanResponse     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtisanResponse {
    Pending,
    Accepted,
    Declined,
}

string_enum!(ArtisanResponse, "artisan response", {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
});

//--------------------------------------    CourierStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Pending,
    Pickup,
    PickupComplete,
    Dropoff,
    Delivered,
    Canceled,
    Returned,
}

string_enum!(CourierStatus, "courier status", {
    Pending => "pending",
    Pickup => "pickup",
    PickupComplete => "pickup_complete",
    Dropoff => "dropoff",
    Delivered => "delivered",
    Canceled => "canceled",
    Returned => "returned",
});

impl CourierStatus {
    /// The courier gave up on the delivery. The order needs operator attention.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Canceled | Self::Returned)
    }
}

//--------------------------------------  WalletTransactionType  -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    /// Seller net earnings credited on revenue recognition.
    Earning,
    /// Platform commission credited to the platform account on revenue recognition.
    PlatformFee,
    /// Buyer paid for an order from their wallet.
    Purchase,
    /// Full refund of a wallet-paid order.
    Refund,
    /// Difference between the charged and the actual delivery fee.
    DeliveryRefund,
    /// Earnings moved to the seller's external payout destination.
    Payout,
    TransferOut,
    TransferIn,
    /// Compensating entry that undoes a half-applied transfer.
    Reversal,
}

string_enum!(WalletTransactionType, "wallet transaction type", {
    Earning => "earning",
    PlatformFee => "platform_fee",
    Purchase => "purchase",
    Refund => "refund",
    DeliveryRefund => "delivery_refund",
    Payout => "payout",
    TransferOut => "transfer_out",
    TransferIn => "transfer_in",
    Reversal => "reversal",
});

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub fulfillment_type: FulfillmentType,
    pub seller_id: Option<AccountId>,
    /// Scheduling slot for `scheduled_order` items.
    pub schedule_slot: Option<String>,
}

impl OrderItem {
    /// The price of the whole line, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------     PaymentHold       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHold {
    /// The processor's identifier for the authorization.
    pub hold_ref: String,
    pub status: HoldStatus,
    pub amount: Money,
    pub authorized_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------   DeliveryPricing     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPricing {
    /// The courier quote at checkout time.
    pub estimated_fee: Money,
    pub buffer_percentage: Rate,
    /// What the buyer paid for delivery: the estimate plus the buffer.
    pub charged_amount: Money,
    pub courier_quote_id: Option<String>,
    pub courier_quote_expiry: Option<DateTime<Utc>>,
}

//--------------------------------------    CostAbsorption     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAbsorption {
    pub required: bool,
    /// The part of the actual delivery fee that exceeds what the buyer was charged.
    pub excess_amount: Money,
    /// The fee quoted by the courier when the order became ready for delivery.
    pub actual_fee: Money,
    pub artisan_response: ArtisanResponse,
    pub responded_at: Option<DateTime<Utc>>,
}

//--------------------------------------   CourierDelivery     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierDelivery {
    /// The provider's delivery identifier.
    pub delivery_id: String,
    pub status: CourierStatus,
    pub fee: Money,
    pub tracking_url: Option<String>,
    pub courier_name: Option<String>,
    pub pickup_eta: Option<DateTime<Utc>>,
    pub dropoff_eta: Option<DateTime<Utc>>,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub buyer_id: AccountId,
    /// Guest checkouts have no internal wallet. Any refunds owed to them are flagged for manual handling.
    pub is_guest: bool,
    pub seller_id: AccountId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    /// Reason given for a decline or cancellation.
    pub status_reason: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_hold: Option<PaymentHold>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub delivery_pricing: Option<DeliveryPricing>,
    pub cost_absorption: Option<CostAbsorption>,
    pub courier_delivery: Option<CourierDelivery>,
    /// Seller commission rate, fixed the first time fees are calculated for this order.
    pub commission_rate: Option<Rate>,
    pub payout_transfer_ref: Option<String>,
    pub last_settlement_error: Option<String>,
    pub capture_claimed_at: Option<DateTime<Utc>>,
    /// When the order was handed over to the buyer. The capture sweep measures its age from here.
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_authorized_card_payment(&self) -> bool {
        self.payment_method == PaymentMethod::ProcessorCard && self.payment_status == PaymentStatus::Authorized
    }

    /// The hold reference, if the order still has a live authorization.
    pub fn live_hold(&self) -> Option<&PaymentHold> {
        self.payment_hold.as_ref().filter(|h| h.status == HoldStatus::Held)
    }

    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.payment_hold.as_ref().map(|h| h.expires_at <= now).unwrap_or(false)
    }

    /// Amount of excess delivery cost the seller agreed to absorb.
    pub fn absorbed_delivery_cost(&self) -> Money {
        match &self.cost_absorption {
            Some(ca) if ca.required && ca.artisan_response == ArtisanResponse::Accepted => ca.excess_amount,
            _ => Money::default(),
        }
    }
}

impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let payment_hold = match row.try_get::<Option<String>, _>("hold_ref")? {
            Some(hold_ref) => Some(PaymentHold {
                hold_ref,
                status: row.try_get::<Option<HoldStatus>, _>("hold_status")?.unwrap_or(HoldStatus::Held),
                amount: row.try_get::<Option<Money>, _>("hold_amount")?.unwrap_or_default(),
                authorized_at: row.try_get("hold_authorized_at")?,
                expires_at: row.try_get("hold_expires_at")?,
            }),
            None => None,
        };
        let delivery_pricing = match row.try_get::<Option<Money>, _>("pricing_charged_amount")? {
            Some(charged_amount) => Some(DeliveryPricing {
                estimated_fee: row.try_get::<Option<Money>, _>("pricing_estimated_fee")?.unwrap_or_default(),
                buffer_percentage: row.try_get::<Option<Rate>, _>("pricing_buffer_bps")?.unwrap_or_default(),
                charged_amount,
                courier_quote_id: row.try_get("pricing_quote_id")?,
                courier_quote_expiry: row.try_get("pricing_quote_expiry")?,
            }),
            None => None,
        };
        let cost_absorption = match row.try_get::<Option<ArtisanResponse>, _>("absorption_response")? {
            Some(artisan_response) => Some(CostAbsorption {
                required: row.try_get::<Option<bool>, _>("absorption_required")?.unwrap_or(false),
                excess_amount: row.try_get::<Option<Money>, _>("absorption_excess")?.unwrap_or_default(),
                actual_fee: row.try_get::<Option<Money>, _>("absorption_actual_fee")?.unwrap_or_default(),
                artisan_response,
                responded_at: row.try_get("absorption_responded_at")?,
            }),
            None => None,
        };
        let courier_delivery = match row.try_get::<Option<String>, _>("courier_delivery_id")? {
            Some(delivery_id) => Some(CourierDelivery {
                delivery_id,
                status: row.try_get::<Option<CourierStatus>, _>("courier_status")?.unwrap_or(CourierStatus::Pending),
                fee: row.try_get::<Option<Money>, _>("courier_fee")?.unwrap_or_default(),
                tracking_url: row.try_get("courier_tracking_url")?,
                courier_name: row.try_get("courier_name")?,
                pickup_eta: row.try_get("courier_pickup_eta")?,
                dropoff_eta: row.try_get("courier_dropoff_eta")?,
            }),
            None => None,
        };
        Ok(Self {
            order_id: row.try_get("order_id")?,
            buyer_id: row.try_get("buyer_id")?,
            is_guest: row.try_get("is_guest")?,
            seller_id: row.try_get("seller_id")?,
            items: Vec::new(),
            status: row.try_get("status")?,
            status_reason: row.try_get("status_reason")?,
            payment_method: row.try_get("payment_method")?,
            payment_status: row.try_get("payment_status")?,
            payment_hold,
            subtotal: row.try_get("subtotal")?,
            delivery_fee: row.try_get("delivery_fee")?,
            total_amount: row.try_get("total_amount")?,
            delivery_method: row.try_get("delivery_method")?,
            delivery_address: row.try_get("delivery_address")?,
            delivery_pricing,
            cost_absorption,
            courier_delivery,
            commission_rate: row.try_get("commission_bps")?,
            payout_transfer_ref: row.try_get("payout_transfer_ref")?,
            last_settlement_error: row.try_get("last_settlement_error")?,
            capture_claimed_at: row.try_get("capture_claimed_at")?,
            fulfilled_at: row.try_get("fulfilled_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------      NewOrder         ---------------------------------------------------------
/// A validated order, ready to be persisted. Produced by the checkout flow once the seller has been normalized,
/// totals checked, inventory reserved and payment collected or authorized.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: AccountId,
    pub is_guest: bool,
    pub seller_id: AccountId,
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_hold: Option<PaymentHold>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub delivery_pricing: Option<DeliveryPricing>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    WalletAccount      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletAccount {
    pub account_id: AccountId,
    pub balance: Money,
    pub currency: String,
    #[serde(skip_serializing)]
    pub payout_destination: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  WalletTransaction    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub account_id: AccountId,
    pub tx_type: WalletTransactionType,
    /// Signed amount. Credits are positive, debits negative.
    pub amount: Money,
    pub description: String,
    pub related_order_id: Option<OrderId>,
    pub idempotency_key: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single ledger movement to apply to a wallet. `amount` is always positive; the direction comes from whether it
/// is passed to `credit` or `debit`.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub account_id: AccountId,
    pub amount: Money,
    pub tx_type: WalletTransactionType,
    pub description: String,
    pub related_order_id: Option<OrderId>,
    /// If set, the entry is applied at most once. A second write with the same key returns the original transaction.
    pub idempotency_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn new<S: Into<String>>(
        account_id: AccountId,
        amount: Money,
        tx_type: WalletTransactionType,
        description: S,
    ) -> Self {
        Self {
            account_id,
            amount,
            tx_type,
            description: description.into(),
            related_order_id: None,
            idempotency_key: None,
            metadata: None,
        }
    }

    pub fn for_order(mut self, order_id: &OrderId) -> Self {
        self.related_order_id = Some(order_id.clone());
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

//--------------------------------------    RevenueRecord      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RevenueRecord {
    pub order_id: OrderId,
    pub seller_id: AccountId,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub platform_fee: Money,
    pub processing_fee: Money,
    /// Delivery money the seller does not keep: courier fees paid by the platform plus any absorbed excess.
    pub delivery_deduction: Money,
    pub net_amount: Money,
    pub commission_bps: Rate,
    pub order_created_at: DateTime<Utc>,
    pub recognized_at: DateTime<Utc>,
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub seller_id: AccountId,
    pub fulfillment_type: FulfillmentType,
    pub stock: i64,
    pub available_quantity: i64,
    pub production_capacity: i64,
    pub status: ProductStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub product_id: ProductId,
    pub slot_id: String,
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub seller_id: AccountId,
    pub fulfillment_type: FulfillmentType,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub available_quantity: i64,
    #[serde(default)]
    pub production_capacity: i64,
    #[serde(default)]
    pub slots: Vec<(String, i64)>,
}
