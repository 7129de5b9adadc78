//! The delivery cost negotiator.
//!
//! At checkout the buyer pays a buffered estimate of the courier fee. Once the artisan has the order ready, a fresh
//! quote decides what happens next: if it fits inside what the buyer paid, the courier is booked and the buyer gets
//! the difference back. If it does not, the artisan is asked whether they will absorb the excess.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        AccountId,
        ArtisanResponse,
        CostAbsorption,
        CourierDelivery,
        DeliveryMethod,
        Order,
        OrderId,
        OrderStatus,
        WalletTransactionType,
    },
    engine_api::{
        errors::SettlementError,
        order_objects::{charged_delivery_fee, CourierStatusUpdate},
        settlement_api::SettlementApi,
    },
    events::NotificationKind,
    traits::{CourierProvider, DeliveryBooking, DeliveryRequest, PaymentProcessor, SettlementDatabase},
};
use settle_common::{Money, Rate};

/// What the buyer will be charged for delivery, based on a live courier quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuote {
    pub courier_quote_id: String,
    pub estimated_fee: Money,
    pub buffer_percentage: Rate,
    pub charged_amount: Money,
    pub courier_quote_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NegotiationOutcome {
    /// A courier was booked. `buyer_refund` is what went back to the buyer.
    Booked { order: Box<Order>, buyer_refund: Money },
    /// The quote exceeds what the buyer paid. The order waits in `ready_for_delivery` for the artisan.
    AwaitingSeller { order: Box<Order>, excess_amount: Money },
    /// Nothing to do: the order already has a courier (possibly booked by a concurrent caller), or is not a
    /// professional delivery.
    NotRequired,
}

pub struct DeliveryApi<B, P, C> {
    db: B,
    courier: C,
    settlement: SettlementApi<B, P>,
    buffer: Rate,
}

impl<B, P, C> Debug for DeliveryApi<B, P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryApi (buffer {})", self.buffer)
    }
}

impl<B: Clone, P: Clone, C: Clone> Clone for DeliveryApi<B, P, C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            courier: self.courier.clone(),
            settlement: self.settlement.clone(),
            buffer: self.buffer,
        }
    }
}

impl<B, P, C> DeliveryApi<B, P, C> {
    pub fn new(db: B, courier: C, settlement: SettlementApi<B, P>, buffer: Rate) -> Self {
        Self { db, courier, settlement, buffer }
    }

    pub fn buffer(&self) -> Rate {
        self.buffer
    }
}

impl<B, P, C> DeliveryApi<B, P, C>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    /// Prices professional delivery for a cart that is about to be checked out.
    pub async fn quote(
        &self,
        seller_id: &AccountId,
        buyer_id: &AccountId,
        dropoff_address: &str,
        order_value: Money,
    ) -> Result<DeliveryQuote, SettlementError> {
        let request = DeliveryRequest {
            order_id: None,
            seller_id: seller_id.clone(),
            buyer_id: buyer_id.clone(),
            dropoff_address: dropoff_address.to_string(),
            order_value,
            quote_id: None,
        };
        let quote = self.courier.quote(&request).await?;
        let charged_amount = charged_delivery_fee(quote.fee, self.buffer);
        debug!("🚚️ Quote {} of {} for {seller_id} becomes a charge of {charged_amount}", quote.quote_id, quote.fee);
        Ok(DeliveryQuote {
            courier_quote_id: quote.quote_id,
            estimated_fee: quote.fee,
            buffer_percentage: self.buffer,
            charged_amount,
            courier_quote_expiry: quote.expires_at,
        })
    }

    /// Gets a fresh courier quote for an order that has just become ready for delivery, and either books the courier
    /// or asks the artisan to absorb the excess.
    pub async fn negotiate(&self, order: &Order) -> Result<NegotiationOutcome, SettlementError> {
        if order.delivery_method != DeliveryMethod::ProfessionalDelivery || order.courier_delivery.is_some() {
            return Ok(NegotiationOutcome::NotRequired);
        }
        if order.status != OrderStatus::ReadyForDelivery {
            return Err(SettlementError::invalid_transition(
                &order.order_id,
                order.status,
                OrderStatus::OutForDelivery,
                "Courier negotiation only runs for orders that are ready for delivery",
            ));
        }
        if let Some(absorption) = order.cost_absorption.as_ref() {
            match absorption.artisan_response {
                ArtisanResponse::Pending if absorption.required => {
                    return Ok(NegotiationOutcome::AwaitingSeller {
                        order: Box::new(order.clone()),
                        excess_amount: absorption.excess_amount,
                    });
                },
                ArtisanResponse::Accepted => return self.book_absorbed(order).await,
                _ => {},
            }
        }
        let charged = order.delivery_pricing.as_ref().map(|p| p.charged_amount).unwrap_or(order.delivery_fee);
        let request = self.delivery_request(order)?;
        let quote = self.courier.quote(&request).await.map_err(|e| {
            warn!("🚚️ Could not get a courier quote for order {}: {e}", order.order_id);
            SettlementError::from(e)
        })?;
        let request = DeliveryRequest { quote_id: Some(quote.quote_id.clone()), ..request };
        if quote.fee <= charged {
            let Some(order) = self.book(order, &request).await? else {
                return Ok(NegotiationOutcome::NotRequired);
            };
            let difference = charged - quote.fee;
            let refunded = self.refund_difference(&order, difference).await?;
            info!(
                "🚚️ Courier booked for order {} at {} (charged {charged}). Buyer refund: {difference}",
                order.order_id, quote.fee
            );
            return Ok(NegotiationOutcome::Booked {
                order: Box::new(order),
                buyer_refund: if refunded { difference } else { Money::default() },
            });
        }
        let excess_amount = quote.fee - charged;
        let absorption = CostAbsorption {
            required: true,
            excess_amount,
            actual_fee: quote.fee,
            artisan_response: ArtisanResponse::Pending,
            responded_at: None,
        };
        let updated = self.db.set_cost_absorption(&order.order_id, &absorption).await?;
        info!(
            "🚚️ Courier fee {} for order {} exceeds the charged {charged} by {excess_amount}. Awaiting the artisan.",
            quote.fee, order.order_id
        );
        self.settlement
            .notify(
                order.seller_id.clone(),
                NotificationKind::DeliveryCostApprovalRequired,
                &updated,
                serde_json::json!({ "excess_amount": excess_amount, "actual_fee": quote.fee, "charged": charged }),
            )
            .await;
        Ok(NegotiationOutcome::AwaitingSeller { order: Box::new(updated), excess_amount })
    }

    /// Stores the artisan's answer. Returns `None` if no answer was pending (already answered, or never asked).
    pub async fn record_response(
        &self,
        order_id: &OrderId,
        response: ArtisanResponse,
    ) -> Result<Option<Order>, SettlementError> {
        if response == ArtisanResponse::Pending {
            return Err(SettlementError::Validation("The response must be accepted or declined".into()));
        }
        let updated = self.db.respond_to_cost_absorption(order_id, response).await?;
        match &updated {
            Some(_) => info!("🚚️ Artisan {response} the delivery cost for order {order_id}"),
            None => debug!("🚚️ No pending delivery cost decision for order {order_id}"),
        }
        Ok(updated)
    }

    /// Books the courier at the real fee after the artisan agreed to absorb the excess. The buyer pays nothing more.
    pub async fn book_absorbed(&self, order: &Order) -> Result<NegotiationOutcome, SettlementError> {
        if order.courier_delivery.is_some() {
            return Ok(NegotiationOutcome::NotRequired);
        }
        let request = self.delivery_request(order)?;
        let Some(order) = self.book(order, &request).await? else {
            return Ok(NegotiationOutcome::NotRequired);
        };
        info!("🚚️ Courier booked for order {} with {} absorbed by the artisan", order.order_id, order.absorbed_delivery_cost());
        Ok(NegotiationOutcome::Booked { order: Box::new(order), buyer_refund: Money::default() })
    }

    /// Records a courier status report against the order that owns the delivery.
    pub async fn apply_status(&self, update: &CourierStatusUpdate) -> Result<Order, SettlementError> {
        let Some(order) = self.db.fetch_order_by_delivery_id(&update.delivery_id).await? else {
            return Err(SettlementError::Validation(format!("Unknown delivery {}", update.delivery_id)));
        };
        let mut delivery = order.courier_delivery.clone().ok_or_else(|| {
            SettlementError::InconsistentState(format!("Order {} lost its courier delivery", order.order_id))
        })?;
        let status_only = update.tracking_url.is_none() && update.courier.is_none() && update.eta.is_none();
        if delivery.status == update.status && status_only {
            trace!("🚚️ Duplicate courier status {} for {}", update.status, update.delivery_id);
            return Ok(order);
        }
        let updated = if status_only {
            self.db
                .update_courier_status(&update.delivery_id, update.status)
                .await?
                .ok_or_else(|| SettlementError::OrderNotFound(order.order_id.clone()))?
        } else {
            delivery.status = update.status;
            if update.tracking_url.is_some() {
                delivery.tracking_url = update.tracking_url.clone();
            }
            if update.courier.is_some() {
                delivery.courier_name = update.courier.clone();
            }
            if update.eta.is_some() {
                delivery.dropoff_eta = update.eta;
            }
            self.db.update_courier_delivery(&order.order_id, &delivery).await?
        };
        debug!("🚚️ Delivery {} for order {} is now {}", update.delivery_id, order.order_id, update.status);
        if update.status.is_failure() {
            let msg = format!("Courier delivery {} ended as {}. Manual follow-up needed.", update.delivery_id, update.status);
            self.settlement.flag_for_attention(&updated, &msg).await;
        }
        Ok(updated)
    }

    /// Asks the courier for the current state of the order's delivery.
    pub async fn poll_status(&self, order: &Order) -> Result<CourierStatusUpdate, SettlementError> {
        let delivery = order.courier_delivery.as_ref().ok_or_else(|| {
            SettlementError::Validation(format!("Order {} has no courier delivery", order.order_id))
        })?;
        let booking = self.courier.get_status(&delivery.delivery_id).await?;
        Ok(CourierStatusUpdate {
            delivery_id: booking.delivery_id,
            status: booking.status,
            tracking_url: booking.tracking_url,
            courier: booking.courier_name,
            eta: booking.dropoff_eta,
        })
    }

    fn delivery_request(&self, order: &Order) -> Result<DeliveryRequest, SettlementError> {
        let dropoff_address = order.delivery_address.clone().ok_or_else(|| {
            SettlementError::InconsistentState(format!("Order {} has no delivery address", order.order_id))
        })?;
        let now = Utc::now();
        let quote_id = order
            .delivery_pricing
            .as_ref()
            .filter(|p| p.courier_quote_expiry.map(|exp| exp > now).unwrap_or(true))
            .and_then(|p| p.courier_quote_id.clone());
        Ok(DeliveryRequest {
            order_id: Some(order.order_id.clone()),
            seller_id: order.seller_id.clone(),
            buyer_id: order.buyer_id.clone(),
            dropoff_address,
            order_value: order.subtotal,
            quote_id,
        })
    }

    /// Books a courier and attaches the booking to the order. Returns `None` if another caller booked the order
    /// first; the surplus booking is cancelled.
    async fn book(&self, order: &Order, request: &DeliveryRequest) -> Result<Option<Order>, SettlementError> {
        let booking = self.courier.create_delivery(request).await.map_err(|e| {
            warn!("🚚️ Courier booking for order {} failed: {e}", order.order_id);
            SettlementError::from(e)
        })?;
        let delivery = courier_delivery(booking);
        match self.db.book_courier_delivery(&order.order_id, &delivery).await {
            Ok(Some(order)) => Ok(Some(order)),
            Ok(None) => {
                info!(
                    "🚚️ Order {} was booked concurrently. Cancelling surplus delivery {}",
                    order.order_id, delivery.delivery_id
                );
                self.cancel_booking(&delivery.delivery_id).await;
                Ok(None)
            },
            Err(e) => {
                warn!("🚚️ Could not store delivery {} for order {}: {e}", delivery.delivery_id, order.order_id);
                self.cancel_booking(&delivery.delivery_id).await;
                Err(e.into())
            },
        }
    }

    async fn cancel_booking(&self, delivery_id: &str) {
        if let Err(e) = self.courier.cancel(delivery_id).await {
            error!("🚚️ Orphaned courier delivery {delivery_id}: {e}");
        }
    }

    async fn refund_difference(&self, order: &Order, difference: Money) -> Result<bool, SettlementError> {
        if !difference.is_positive() {
            return Ok(false);
        }
        let key = format!("delivery-refund:{}", order.order_id);
        let description = format!("Delivery fee difference for order {}", order.order_id);
        let applied = self
            .settlement
            .credit_buyer(order, difference, WalletTransactionType::DeliveryRefund, &key, &description)
            .await?;
        if applied {
            self.settlement
                .notify(
                    order.buyer_id.clone(),
                    NotificationKind::DeliveryRefundIssued,
                    order,
                    serde_json::json!({ "amount": difference }),
                )
                .await;
        }
        Ok(applied)
    }
}

fn courier_delivery(booking: DeliveryBooking) -> CourierDelivery {
    CourierDelivery {
        delivery_id: booking.delivery_id,
        status: booking.status,
        fee: booking.fee,
        tracking_url: booking.tracking_url,
        courier_name: booking.courier_name,
        pickup_eta: booking.pickup_eta,
        dropoff_eta: booking.dropoff_eta,
    }
}
