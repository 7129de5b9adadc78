//! The order lifecycle state machine.
//!
//! `OrderFlowApi` is the entry point for every trigger that moves an order: checkout, artisan and admin status
//! updates, buyer cancellation and confirmation, artisan delivery-cost responses, courier reports and the capture
//! sweep. Each transition is a conditional update on the persisted status, so exactly one concurrent caller wins it.
//! Only the winner runs the transition's side effects, in a fixed order, re-reading the order between steps:
//!
//! 1. entering `delivered` or `picked_up` captures an authorized card payment;
//! 2. entering `declined` or `cancelled` restores inventory and refunds the buyer;
//! 3. entering `completed` recognizes revenue;
//! 4. entering `ready_for_delivery` with professional delivery starts the courier negotiation.
//!
//! Side-effect failures never undo the status change. They are logged, stored on the order and picked up again by
//! the sweep or a manual retry.
use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{
        AccountId,
        ArtisanResponse,
        CourierStatus,
        DeliveryMethod,
        LedgerEntry,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentHold,
        PaymentStatus,
        RevenueRecord,
        WalletTransactionType,
    },
    engine_api::{
        delivery_api::{DeliveryApi, DeliveryQuote, NegotiationOutcome},
        errors::SettlementError,
        inventory_api::InventoryApi,
        order_objects::{CheckoutPlan, CheckoutRequest, CourierStatusUpdate, PaymentSource, StatusUpdateRequest},
        settlement_api::{CaptureOutcome, SettlementApi, SettlementConfig, SweepEntry},
        wallet_api::WalletApi,
    },
    events::{EventProducers, EventType, NotificationEvent, NotificationKind, OrderStatusChangedEvent},
    traits::{CourierProvider, FeeConfigProvider, OrderQueryFilter, PaymentProcessor, SettlementDatabase},
};
use settle_common::{Money, Rate};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settlement: SettlementConfig,
    /// Margin added to the courier estimate when charging the buyer for professional delivery.
    pub delivery_buffer: Rate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { settlement: SettlementConfig::default(), delivery_buffer: Rate::from_percent(20) }
    }
}

pub struct OrderFlowApi<B, P, C> {
    db: B,
    inventory: InventoryApi<B>,
    wallet: WalletApi<B>,
    settlement: SettlementApi<B, P>,
    delivery: DeliveryApi<B, P, C>,
    producers: EventProducers,
}

impl<B, P, C> Debug for OrderFlowApi<B, P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone, P: Clone, C: Clone> Clone for OrderFlowApi<B, P, C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            inventory: self.inventory.clone(),
            wallet: self.wallet.clone(),
            settlement: self.settlement.clone(),
            delivery: self.delivery.clone(),
            producers: self.producers.clone(),
        }
    }
}

impl<B: Clone, P: Clone, C> OrderFlowApi<B, P, C> {
    pub fn new(
        db: B,
        processor: P,
        courier: C,
        fees: Arc<dyn FeeConfigProvider>,
        producers: EventProducers,
        config: EngineConfig,
    ) -> Self {
        let settlement = SettlementApi::new(db.clone(), processor, fees, producers.clone(), config.settlement);
        let delivery = DeliveryApi::new(db.clone(), courier, settlement.clone(), config.delivery_buffer);
        Self {
            inventory: InventoryApi::new(db.clone()),
            wallet: WalletApi::new(db.clone()),
            db,
            settlement,
            delivery,
            producers,
        }
    }
}

impl<B, P, C> OrderFlowApi<B, P, C> {
    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn settlement(&self) -> &SettlementApi<B, P> {
        &self.settlement
    }

    pub fn delivery(&self) -> &DeliveryApi<B, P, C> {
        &self.delivery
    }

    pub fn wallet(&self) -> &WalletApi<B> {
        &self.wallet
    }

    pub fn inventory(&self) -> &InventoryApi<B> {
        &self.inventory
    }
}

impl<B, P, C> OrderFlowApi<B, P, C>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    //-----------------------------------------   Checkout   -----------------------------------------------------

    /// Turns a confirmed cart into a `pending` order.
    ///
    /// Inventory is reserved first, then the buyer pays (wallet debit, card hold, or immediate guest capture). If
    /// payment fails, the reservation is given back and no order exists. Resubmitting a request with the same order id
    /// returns the existing order, and the boolean is `false`.
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<(Order, bool), SettlementError> {
        let plan = request.into_plan(self.delivery.buffer())?;
        if let Some(existing) = self.db.fetch_order(&plan.order_id).await? {
            debug!("🔄️ Checkout for {} was already completed", plan.order_id);
            return Ok((existing, false));
        }
        self.inventory.reserve(&plan.items).await?;
        let (payment_status, payment_hold) = match self.collect_payment(&plan).await {
            Ok(p) => p,
            Err(e) => {
                info!("🔄️ Payment for checkout {} failed: {e}. Releasing the reservation.", plan.order_id);
                self.restore_inventory(&plan.order_id, &plan.items).await;
                return Err(e);
            },
        };
        let new_order = NewOrder {
            order_id: plan.order_id.clone(),
            buyer_id: plan.buyer_id.clone(),
            is_guest: plan.is_guest,
            seller_id: plan.seller_id.clone(),
            items: plan.items.clone(),
            payment_method: plan.payment_method(),
            payment_status,
            payment_hold,
            subtotal: plan.subtotal,
            delivery_fee: plan.delivery_fee,
            total_amount: plan.total_amount,
            delivery_method: plan.delivery_method,
            delivery_address: plan.delivery_address.clone(),
            delivery_pricing: plan.delivery_pricing.clone(),
            created_at: Utc::now(),
        };
        let (order, inserted) = match self.db.insert_order(new_order).await {
            Ok(result) => result,
            Err(e) => {
                error!("🔄️ Could not store order {}: {e}. Undoing the checkout.", plan.order_id);
                self.restore_inventory(&plan.order_id, &plan.items).await;
                self.reverse_payment(&plan).await;
                return Err(e.into());
            },
        };
        if !inserted {
            info!("🔄️ Order {} was created concurrently. Releasing the duplicate reservation.", order.order_id);
            self.restore_inventory(&order.order_id, &plan.items).await;
            return Ok((order, false));
        }
        info!(
            "🔄️ Order {} created for {} from seller {}. Total {} ({})",
            order.order_id, order.buyer_id, order.seller_id, order.total_amount, order.payment_status
        );
        self.notify(&order.seller_id, NotificationKind::OrderPlaced, &order).await;
        Ok((order, true))
    }

    async fn collect_payment(
        &self,
        plan: &CheckoutPlan,
    ) -> Result<(PaymentStatus, Option<PaymentHold>), SettlementError> {
        match &plan.payment {
            PaymentSource::Wallet => {
                let reversed = self
                    .wallet
                    .transactions_for_order(&plan.order_id)
                    .await?
                    .iter()
                    .any(|tx| tx.tx_type == WalletTransactionType::Reversal);
                if reversed {
                    return Err(SettlementError::Validation(format!(
                        "Checkout {} was rolled back. Submit it again with a new order id.",
                        plan.order_id
                    )));
                }
                let entry = LedgerEntry::new(
                    plan.buyer_id.clone(),
                    plan.total_amount,
                    WalletTransactionType::Purchase,
                    format!("Payment for order {}", plan.order_id),
                )
                .for_order(&plan.order_id)
                .with_idempotency_key(format!("purchase:{}", plan.order_id));
                self.wallet.debit(entry).await?;
                Ok((PaymentStatus::Paid, None))
            },
            PaymentSource::CardToken(token) => {
                let hold = self.settlement.authorize(&plan.order_id, plan.total_amount, token).await?;
                Ok((PaymentStatus::Authorized, Some(hold)))
            },
            PaymentSource::CardHold(hold_ref) => {
                Ok((PaymentStatus::Authorized, Some(self.settlement.external_hold(hold_ref, plan.total_amount))))
            },
            PaymentSource::GuestCard(token) => {
                let hold = self.settlement.authorize_and_capture(&plan.order_id, plan.total_amount, token).await?;
                Ok((PaymentStatus::Captured, Some(hold)))
            },
        }
    }

    async fn reverse_payment(&self, plan: &CheckoutPlan) {
        if plan.payment != PaymentSource::Wallet {
            warn!(
                "🔄️ Card payment for failed checkout {} is left to lapse or needs a manual refund",
                plan.order_id
            );
            return;
        }
        let entry = LedgerEntry::new(
            plan.buyer_id.clone(),
            plan.total_amount,
            WalletTransactionType::Reversal,
            format!("Reversal of payment for failed checkout {}", plan.order_id),
        )
        .for_order(&plan.order_id)
        .with_idempotency_key(format!("reversal:purchase:{}", plan.order_id));
        if let Err(e) = self.wallet.credit(entry).await {
            error!("🔄️ Buyer {} was charged for failed checkout {} and could not be repaid: {e}", plan.buyer_id, plan.order_id);
        }
    }

    //-----------------------------------------   Transitions   --------------------------------------------------

    /// An artisan or admin moves the order along its lifecycle.
    ///
    /// `declined` and `cancelled` are only accepted while the order is `pending`, and declining needs a reason.
    /// Completion is left to the buyer, or to the automatic paths.
    pub async fn update_status(&self, order_id: &OrderId, request: StatusUpdateRequest) -> Result<Order, SettlementError> {
        let order = self.fetch(order_id).await?;
        let to = request.status;
        let reason = request.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let refuse = |detail: &str| Err(SettlementError::invalid_transition(order_id, order.status, to, detail));
        match to {
            OrderStatus::Declined | OrderStatus::Cancelled if order.status != OrderStatus::Pending => {
                return refuse("Only pending orders can be declined or cancelled");
            },
            OrderStatus::Declined if reason.is_none() => {
                return Err(SettlementError::Validation("A reason is required to decline an order".into()));
            },
            OrderStatus::Completed => return refuse("Orders are completed by the buyer or automatically"),
            OrderStatus::ReadyForPickup if order.delivery_method != DeliveryMethod::Pickup => {
                return refuse("This order is not for pickup");
            },
            OrderStatus::ReadyForDelivery if order.delivery_method == DeliveryMethod::Pickup => {
                return refuse("Pickup orders are not delivered");
            },
            OrderStatus::OutForDelivery |
            OrderStatus::Delivered
                if order.delivery_method == DeliveryMethod::ProfessionalDelivery &&
                    order.courier_delivery.is_none() =>
            {
                return refuse("Professional deliveries move on once a courier has been booked");
            },
            _ => {},
        }
        if !order.status.can_transition_to(to) {
            return refuse("The lifecycle does not allow this change");
        }
        self.transition(order, to, reason).await
    }

    /// The buyer cancels an order the artisan has not accepted yet.
    pub async fn cancel_by_buyer(
        &self,
        order_id: &OrderId,
        buyer_id: &AccountId,
        reason: Option<String>,
    ) -> Result<Order, SettlementError> {
        let order = self.fetch(order_id).await?;
        if order.buyer_id != *buyer_id {
            return Err(SettlementError::Validation(format!("Order {order_id} does not belong to {buyer_id}")));
        }
        if order.status != OrderStatus::Pending {
            return Err(SettlementError::invalid_transition(
                order_id,
                order.status,
                OrderStatus::Cancelled,
                "Orders can only be cancelled before the artisan confirms them",
            ));
        }
        let reason = reason.unwrap_or_else(|| "Cancelled by buyer".to_string());
        self.transition(order, OrderStatus::Cancelled, Some(reason)).await
    }

    /// The buyer confirms they received the order. A card payment that is still only authorized is captured first.
    pub async fn confirm_receipt(&self, order_id: &OrderId, buyer_id: &AccountId) -> Result<Order, SettlementError> {
        let order = self.fetch(order_id).await?;
        if order.buyer_id != *buyer_id {
            return Err(SettlementError::Validation(format!("Order {order_id} does not belong to {buyer_id}")));
        }
        if !order.status.is_fulfilled() {
            return Err(SettlementError::invalid_transition(
                order_id,
                order.status,
                OrderStatus::Completed,
                "Only delivered or picked-up orders can be confirmed",
            ));
        }
        if order.is_authorized_card_payment() {
            self.try_capture(&order).await;
        }
        let order = self.fetch(order_id).await?;
        self.transition(order, OrderStatus::Completed, None).await
    }

    /// The manual settlement trigger. Captures if needed; otherwise retries any settlement step still outstanding.
    pub async fn capture_payment(&self, order_id: &OrderId) -> Result<CaptureOutcome, SettlementError> {
        let outcome = self.settlement.capture(order_id).await?;
        if matches!(outcome, CaptureOutcome::AlreadyCaptured | CaptureOutcome::NotApplicable { .. }) {
            let order = self.fetch(order_id).await?;
            if order.payment_status.is_settled() && (order.status.is_fulfilled() || order.status == OrderStatus::Completed)
            {
                self.settlement.settle(&order).await?;
            }
        }
        Ok(outcome)
    }

    /// Runs the capture sweep over authorized orders that were handed over at least `older_than` ago.
    pub async fn sweep(&self, older_than: Duration) -> Result<Vec<SweepEntry>, SettlementError> {
        self.settlement.sweep(older_than).await
    }

    //-----------------------------------------   Delivery   -----------------------------------------------------

    pub async fn quote_delivery(
        &self,
        seller_id: &AccountId,
        buyer_id: &AccountId,
        dropoff_address: &str,
        order_value: Money,
    ) -> Result<DeliveryQuote, SettlementError> {
        self.delivery.quote(seller_id, buyer_id, dropoff_address, order_value).await
    }

    /// The artisan accepts or declines the excess courier cost. Accepting books the courier; declining cancels the
    /// order with a full refund.
    pub async fn respond_to_delivery_cost(
        &self,
        order_id: &OrderId,
        response: ArtisanResponse,
    ) -> Result<Order, SettlementError> {
        let order = self.fetch(order_id).await?;
        if order.status != OrderStatus::ReadyForDelivery {
            return Err(SettlementError::invalid_transition(
                order_id,
                order.status,
                OrderStatus::OutForDelivery,
                "There is no delivery cost decision to make",
            ));
        }
        let Some(order) = self.delivery.record_response(order_id, response).await? else {
            let current = self.fetch(order_id).await?;
            return match current.cost_absorption.as_ref().map(|ca| ca.artisan_response) {
                Some(previous) if previous == response => Ok(current),
                _ => Err(SettlementError::Validation(format!(
                    "Order {order_id} has no pending delivery cost decision"
                ))),
            };
        };
        match response {
            ArtisanResponse::Accepted => match self.delivery.book_absorbed(&order).await {
                Ok(NegotiationOutcome::Booked { order, .. }) => {
                    self.transition(*order, OrderStatus::OutForDelivery, None).await
                },
                Ok(_) => Ok(order),
                Err(e) => {
                    self.record_error(order_id, format!("courier booking failed: {e}")).await;
                    Err(e)
                },
            },
            _ => {
                let reason = "The artisan declined the extra delivery cost".to_string();
                self.transition(order, OrderStatus::Cancelled, Some(reason)).await
            },
        }
    }

    /// Applies a courier status report. A confirmed drop-off delivers the order and completes it straight away.
    pub async fn handle_courier_update(&self, update: CourierStatusUpdate) -> Result<Order, SettlementError> {
        let order = self.delivery.apply_status(&update).await?;
        if update.status != CourierStatus::Delivered {
            return Ok(order);
        }
        match order.status {
            OrderStatus::OutForDelivery => self.transition(order, OrderStatus::Delivered, None).await,
            OrderStatus::Delivered => self.transition(order, OrderStatus::Completed, None).await,
            _ => Ok(order),
        }
    }

    /// Polls the courier for the order's delivery, or retries the courier negotiation if nothing was booked yet.
    pub async fn refresh_delivery(&self, order_id: &OrderId) -> Result<Order, SettlementError> {
        let order = self.fetch(order_id).await?;
        if order.delivery_method != DeliveryMethod::ProfessionalDelivery {
            return Err(SettlementError::Validation(format!("Order {order_id} is not a courier delivery")));
        }
        if order.courier_delivery.is_none() {
            if order.status != OrderStatus::ReadyForDelivery {
                return Ok(order);
            }
            return match self.delivery.negotiate(&order).await? {
                NegotiationOutcome::Booked { order, .. } => {
                    self.transition(*order, OrderStatus::OutForDelivery, None).await
                },
                NegotiationOutcome::AwaitingSeller { order, .. } => Ok(*order),
                NegotiationOutcome::NotRequired => self.fetch(order_id).await,
            };
        }
        let update = self.delivery.poll_status(&order).await?;
        self.handle_courier_update(update).await
    }

    //-----------------------------------------   Queries   ------------------------------------------------------

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementError> {
        Ok(self.db.fetch_order(order_id).await?)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, SettlementError> {
        Ok(self.db.search_orders(query).await?)
    }

    pub async fn revenue_record(&self, order_id: &OrderId) -> Result<Option<RevenueRecord>, SettlementError> {
        Ok(self.db.fetch_revenue_record(order_id).await?)
    }

    pub async fn revenue_for_seller(&self, seller_id: &AccountId) -> Result<Vec<RevenueRecord>, SettlementError> {
        Ok(self.db.fetch_revenue_for_seller(seller_id).await?)
    }

    //-----------------------------------------   Internals   ----------------------------------------------------

    /// Moves the order to `to`, then follows any automatic transitions its side effects call for.
    async fn transition(&self, order: Order, to: OrderStatus, reason: Option<String>) -> Result<Order, SettlementError> {
        let (mut current, mut next) = self.apply_transition(order, to, reason).await?;
        while let Some(status) = next {
            match self.apply_transition(current.clone(), status, None).await {
                Ok((order, follow_up)) => {
                    current = order;
                    next = follow_up;
                },
                Err(e) => {
                    warn!("🔄️ Automatic move of order {} to {status} did not happen: {e}", current.order_id);
                    break;
                },
            }
        }
        Ok(current)
    }

    async fn apply_transition(
        &self,
        order: Order,
        to: OrderStatus,
        reason: Option<String>,
    ) -> Result<(Order, Option<OrderStatus>), SettlementError> {
        let from = order.status;
        let order_id = order.order_id.clone();
        if !from.can_transition_to(to) {
            return Err(SettlementError::invalid_transition(&order_id, from, to, "The lifecycle does not allow this change"));
        }
        let Some(updated) = self.db.transition_status(&order_id, from, to, reason).await? else {
            let current = self.fetch(&order_id).await?;
            debug!("🔄️ Lost the race to move order {order_id} from {from}. It is now {}", current.status);
            return Err(SettlementError::invalid_transition(
                &order_id,
                current.status,
                to,
                "The order changed while this update was being made",
            ));
        };
        info!("🔄️ Order {order_id}: {from} → {to}");
        self.producers.publish(EventType::OrderStatusChanged(OrderStatusChangedEvent::new(updated.clone(), from))).await;
        let follow_up = self.run_side_effects(&updated).await;
        let current = self.fetch(&order_id).await?;
        self.notify_status(&current).await;
        Ok((current, follow_up))
    }

    /// Runs the side effects of entering `order.status`. Returns the status the order should move to next, if any.
    async fn run_side_effects(&self, order: &Order) -> Option<OrderStatus> {
        match order.status {
            OrderStatus::Delivered | OrderStatus::PickedUp => {
                if order.is_authorized_card_payment() {
                    self.try_capture(order).await;
                }
                let courier_confirmed = order
                    .courier_delivery
                    .as_ref()
                    .map(|cd| cd.status == CourierStatus::Delivered)
                    .unwrap_or(false);
                if order.is_guest || courier_confirmed {
                    debug!("🔄️ Order {} needs no buyer confirmation. Completing it.", order.order_id);
                    Some(OrderStatus::Completed)
                } else {
                    None
                }
            },
            OrderStatus::Declined | OrderStatus::Cancelled => {
                self.restore_inventory(&order.order_id, &order.items).await;
                let reason = order.status_reason.clone().unwrap_or_else(|| order.status.to_string());
                match self.settlement.refund(&order.order_id, &reason).await {
                    Ok(outcome) => debug!("🔄️ Refund for order {}: {outcome:?}", order.order_id),
                    Err(e) => {
                        warn!("🔄️ Refund for order {} failed: {e}", order.order_id);
                        self.record_error(&order.order_id, format!("refund failed: {e}")).await;
                    },
                }
                None
            },
            OrderStatus::Completed => {
                if order.is_authorized_card_payment() {
                    self.try_capture(order).await;
                }
                match self.fetch(&order.order_id).await {
                    Ok(current) => {
                        if let Err(e) = self.settlement.settle(&current).await {
                            warn!("🔄️ Revenue recognition for order {} failed: {e}", order.order_id);
                            self.record_error(&order.order_id, format!("revenue recognition failed: {e}")).await;
                        }
                    },
                    Err(e) => warn!("🔄️ Could not re-read order {}: {e}", order.order_id),
                }
                None
            },
            OrderStatus::ReadyForDelivery if order.delivery_method == DeliveryMethod::ProfessionalDelivery => {
                match self.delivery.negotiate(order).await {
                    Ok(NegotiationOutcome::Booked { .. }) => Some(OrderStatus::OutForDelivery),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("🔄️ Courier negotiation for order {} failed: {e}", order.order_id);
                        self.record_error(&order.order_id, format!("courier negotiation failed: {e}")).await;
                        None
                    },
                }
            },
            _ => None,
        }
    }

    async fn try_capture(&self, order: &Order) {
        match self.settlement.capture(&order.order_id).await {
            Ok(outcome) => trace!("🔄️ Capture for order {}: {outcome:?}", order.order_id),
            Err(e) => warn!("🔄️ Capture for order {} failed and is left for the sweep: {e}", order.order_id),
        }
    }

    async fn restore_inventory(&self, order_id: &OrderId, items: &[OrderItem]) {
        if let Err(e) = self.inventory.restore(items).await {
            warn!("🔄️ Inventory for order {order_id} could not be restored. Needs reconciliation: {e}");
        }
    }

    async fn record_error(&self, order_id: &OrderId, message: String) {
        if let Err(e) = self.db.record_settlement_error(order_id, Some(message)).await {
            error!("🔄️ Could not record settlement error on order {order_id}: {e}");
        }
    }

    async fn notify_status(&self, order: &Order) {
        let Some(kind) = NotificationKind::for_status(order.status) else {
            return;
        };
        self.notify(&order.buyer_id, kind, order).await;
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Completed) {
            self.notify(&order.seller_id, kind, order).await;
        }
    }

    async fn notify(&self, recipient: &AccountId, kind: NotificationKind, order: &Order) {
        let payload = serde_json::json!({
            "status": order.status,
            "payment_status": order.payment_status,
            "total_amount": order.total_amount,
            "reason": order.status_reason,
        });
        let event = NotificationEvent::new(recipient.clone(), kind, Some(order.order_id.clone()), payload);
        self.producers.publish(EventType::Notification(event)).await;
    }

    async fn fetch(&self, order_id: &OrderId) -> Result<Order, SettlementError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))
    }
}
