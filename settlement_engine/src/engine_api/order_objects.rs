use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        AccountId,
        ArtisanResponse,
        CourierStatus,
        DeliveryMethod,
        DeliveryPricing,
        FulfillmentType,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentMethod,
        ProductId,
    },
    engine_api::errors::SettlementError,
};
use settle_common::{Money, Rate};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub fulfillment_type: FulfillmentType,
    #[serde(default)]
    pub seller_id: Option<AccountId>,
    #[serde(default)]
    pub schedule_slot: Option<String>,
}

/// The live courier quote the buyer's client obtained before checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuoteInput {
    pub estimated_fee: Money,
    #[serde(default)]
    pub courier_quote_id: Option<String>,
    #[serde(default)]
    pub courier_quote_expiry: Option<DateTime<Utc>>,
}

/// A confirmed cart, as submitted to `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Lets a client retry checkout safely. Generated when absent.
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub buyer_id: Option<AccountId>,
    #[serde(default)]
    pub is_guest: bool,
    /// The order-level seller. Falls back to the seller shared by every line item.
    #[serde(default)]
    pub seller_id: Option<AccountId>,
    pub items: Vec<CheckoutItem>,
    pub payment_method: PaymentMethod,
    /// Tokenized card details, for the engine to authorize.
    #[serde(default)]
    pub payment_token: Option<String>,
    /// A hold the client already placed with the processor.
    #[serde(default)]
    pub hold_ref: Option<String>,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_fee: Money,
    #[serde(default)]
    pub delivery_pricing: Option<DeliveryQuoteInput>,
    #[serde(default)]
    pub subtotal: Option<Money>,
    #[serde(default)]
    pub total_amount: Option<Money>,
}

/// How the buyer pays, once the request has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSource {
    Wallet,
    /// Authorize a hold, and capture it later.
    CardToken(String),
    /// Use a hold that already exists.
    CardHold(String),
    /// Guest checkout: authorize and capture at once.
    GuestCard(String),
}

/// A checkout request that passed validation, with its seller normalized and its amounts computed.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub order_id: OrderId,
    pub buyer_id: AccountId,
    pub is_guest: bool,
    pub seller_id: AccountId,
    pub items: Vec<OrderItem>,
    pub payment: PaymentSource,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: Option<String>,
    pub delivery_pricing: Option<DeliveryPricing>,
}

impl CheckoutPlan {
    pub fn payment_method(&self) -> PaymentMethod {
        match self.payment {
            PaymentSource::Wallet => PaymentMethod::InternalWallet,
            _ => PaymentMethod::ProcessorCard,
        }
    }
}

/// The buyer-facing delivery charge for a courier estimate: the estimate plus the buffer margin.
pub fn charged_delivery_fee(estimated_fee: Money, buffer: Rate) -> Money {
    estimated_fee + buffer.apply(estimated_fee)
}

fn invalid<S: Into<String>>(msg: S) -> SettlementError {
    SettlementError::Validation(msg.into())
}

impl CheckoutRequest {
    /// Validates the request and produces a [`CheckoutPlan`]. Nothing is written; a request that fails here has no
    /// side effects.
    pub fn into_plan(self, delivery_buffer: Rate) -> Result<CheckoutPlan, SettlementError> {
        if self.items.is_empty() {
            return Err(invalid("An order needs at least one item"));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity <= 0) {
            return Err(invalid(format!("Quantity for {} must be positive", item.product_id)));
        }
        if let Some(item) = self.items.iter().find(|i| i.unit_price.is_negative()) {
            return Err(invalid(format!("Unit price for {} cannot be negative", item.product_id)));
        }
        if self.delivery_fee.is_negative() {
            return Err(invalid("Delivery fee cannot be negative"));
        }
        let seller_id = normalize_seller(self.seller_id.as_ref(), &self.items)?;
        let order_id = self.order_id.unwrap_or_else(OrderId::random);
        let buyer_id = match (self.is_guest, self.buyer_id) {
            (false, Some(id)) => id,
            (false, None) => return Err(invalid("A registered buyer id is required")),
            (true, Some(id)) => id,
            (true, None) => AccountId::from(format!("guest-{order_id}")),
        };
        if buyer_id == seller_id {
            return Err(invalid("Sellers cannot buy their own products"));
        }
        let payment = match (self.payment_method, self.is_guest, self.payment_token, self.hold_ref) {
            (PaymentMethod::InternalWallet, true, _, _) => {
                return Err(invalid("Guest orders must be paid by card"));
            },
            (PaymentMethod::InternalWallet, false, _, _) => PaymentSource::Wallet,
            (PaymentMethod::ProcessorCard, true, Some(token), _) => PaymentSource::GuestCard(token),
            (PaymentMethod::ProcessorCard, true, None, _) => {
                return Err(invalid("Guest card payments need a payment token"));
            },
            (PaymentMethod::ProcessorCard, false, _, Some(hold)) => PaymentSource::CardHold(hold),
            (PaymentMethod::ProcessorCard, false, Some(token), None) => PaymentSource::CardToken(token),
            (PaymentMethod::ProcessorCard, false, None, None) => {
                return Err(invalid("Card payments need a payment token or an existing hold"));
            },
        };
        let delivery_address = self.delivery_address.filter(|a| !a.trim().is_empty());
        let delivery_pricing = match self.delivery_method {
            DeliveryMethod::Pickup => {
                if !self.delivery_fee.is_zero() {
                    return Err(invalid("Pickup orders carry no delivery fee"));
                }
                None
            },
            DeliveryMethod::PersonalDelivery => {
                if delivery_address.is_none() {
                    return Err(invalid("A delivery address is required"));
                }
                None
            },
            DeliveryMethod::ProfessionalDelivery => {
                if delivery_address.is_none() {
                    return Err(invalid("A delivery address is required"));
                }
                let quote = self
                    .delivery_pricing
                    .ok_or_else(|| invalid("Professional delivery requires delivery pricing"))?;
                if quote.estimated_fee.is_negative() {
                    return Err(invalid("The estimated delivery fee cannot be negative"));
                }
                let charged_amount = charged_delivery_fee(quote.estimated_fee, delivery_buffer);
                if charged_amount != self.delivery_fee {
                    return Err(invalid(format!(
                        "Delivery fee {} does not match the charged amount {charged_amount} for an estimate of {}",
                        self.delivery_fee, quote.estimated_fee
                    )));
                }
                Some(DeliveryPricing {
                    estimated_fee: quote.estimated_fee,
                    buffer_percentage: delivery_buffer,
                    charged_amount,
                    courier_quote_id: quote.courier_quote_id,
                    courier_quote_expiry: quote.courier_quote_expiry,
                })
            },
        };
        let items: Vec<OrderItem> = self
            .items
            .into_iter()
            .map(|i| OrderItem {
                product_id: i.product_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
                fulfillment_type: i.fulfillment_type,
                seller_id: Some(seller_id.clone()),
                schedule_slot: i.schedule_slot,
            })
            .collect();
        let subtotal = items
            .iter()
            .try_fold(Money::default(), |acc, item| item.line_total().and_then(|line| acc.checked_add(line)))
            .ok_or_else(|| invalid("The order subtotal is too large"))?;
        if let Some(claimed) = self.subtotal {
            if claimed != subtotal {
                return Err(invalid(format!("Subtotal {claimed} does not match the items ({subtotal})")));
            }
        }
        let total_amount =
            subtotal.checked_add(self.delivery_fee).ok_or_else(|| invalid("The order total is too large"))?;
        if let Some(claimed) = self.total_amount {
            if claimed != total_amount {
                return Err(invalid(format!(
                    "Total {claimed} does not equal subtotal {subtotal} plus delivery {}",
                    self.delivery_fee
                )));
            }
        }
        if !total_amount.is_positive() {
            return Err(invalid("The order total must be positive"));
        }
        Ok(CheckoutPlan {
            order_id,
            buyer_id,
            is_guest: self.is_guest,
            seller_id,
            items,
            payment,
            subtotal,
            delivery_fee: self.delivery_fee,
            total_amount,
            delivery_method: self.delivery_method,
            delivery_address,
            delivery_pricing,
        })
    }
}

/// Produces the single canonical seller for an order: the order-level seller if given, otherwise the one seller
/// every line item names. Items that disagree with it are rejected.
pub fn normalize_seller(order_seller: Option<&AccountId>, items: &[CheckoutItem]) -> Result<AccountId, SettlementError> {
    let mut sellers = items.iter().filter_map(|i| i.seller_id.as_ref());
    let seller = match order_seller {
        Some(s) => s.clone(),
        None => sellers.next().cloned().ok_or_else(|| invalid("The order does not name a seller"))?,
    };
    if items.iter().filter_map(|i| i.seller_id.as_ref()).any(|s| *s != seller) {
        return Err(invalid("All items in an order must belong to the same seller"));
    }
    Ok(seller)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostResponseRequest {
    pub response: ArtisanResponse,
}

/// A courier status report, from the provider's webhook or a status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierStatusUpdate {
    pub delivery_id: String,
    pub status: CourierStatus,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,
}
