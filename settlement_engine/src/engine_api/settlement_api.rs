//! The payment settlement coordinator.
//!
//! Capture, revenue recognition, payouts and refunds can each be requested by several independent triggers (status
//! updates, courier webhooks, the sweep, the manual capture endpoint and buyer confirmation). None of them assumes it
//! is the first. Every step re-reads the order, checks a persisted witness (payment status, capture claim, revenue
//! record, ledger idempotency key, payout reference) and then applies a conditional update, so repeated or
//! concurrent calls collapse into a single effect.
use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        AccountId,
        DeliveryMethod,
        HoldStatus,
        LedgerEntry,
        Order,
        OrderId,
        PaymentHold,
        PaymentMethod,
        PaymentStatus,
        RevenueRecord,
        WalletTransactionType,
    },
    engine_api::{errors::SettlementError, fee_calculator::calculate_with_schedule},
    events::{EventProducers, EventType, NotificationEvent, NotificationKind, RevenueRecognizedEvent},
    traits::{AuthorizationRequest, FeeConfigProvider, FeeSchedule, PaymentProcessor, ProcessorError, SettlementDatabase},
};
use settle_common::{Money, DEFAULT_CURRENCY_CODE};

/// The pseudo-account that receives operator alerts.
pub fn operations_account() -> AccountId {
    AccountId::from("operations")
}

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub currency: String,
    /// Validity assumed for a hold when the processor does not report an expiry.
    pub hold_validity: Duration,
    /// How long a capture claim blocks other triggers.
    pub capture_lease: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            hold_validity: Duration::hours(168),
            capture_lease: Duration::minutes(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// This call captured the payment.
    Captured { order: Box<Order> },
    /// The payment had already been captured (or refunded). Nothing was sent to the processor.
    AlreadyCaptured,
    /// Another trigger holds the capture claim right now.
    InProgress,
    /// The order's payment is not an authorized card hold.
    NotApplicable { payment_status: PaymentStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RevenueOutcome {
    Recognized { record: RevenueRecord },
    AlreadyRecognized { record: RevenueRecord },
    /// Funds have not been collected yet. Recognition will run again once they are.
    Deferred { payment_status: PaymentStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PayoutOutcome {
    Sent { transfer_ref: String },
    AlreadySent { transfer_ref: String },
    NoDestination,
    NotApplicable,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// The buyer's wallet was credited.
    WalletRefunded { amount: Money },
    /// The card hold was dropped before capture. No money moved.
    HoldReleased,
    AlreadyRefunded,
    /// A captured card payment (guest checkout) cannot be refunded automatically.
    ManualRefundRequired { amount: Money },
    NothingToRefund,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepResult {
    Captured,
    AlreadyCaptured,
    InProgress,
    HoldExpired,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub result: SweepResult,
}

/// `SettlementApi` owns the authorize → capture → recognize → payout workflow and refunds.
pub struct SettlementApi<B, P> {
    db: B,
    processor: P,
    fees: Arc<dyn FeeConfigProvider>,
    producers: EventProducers,
    config: SettlementConfig,
}

impl<B, P> Debug for SettlementApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B: Clone, P: Clone> Clone for SettlementApi<B, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            processor: self.processor.clone(),
            fees: Arc::clone(&self.fees),
            producers: self.producers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B, P> SettlementApi<B, P> {
    pub fn new(
        db: B,
        processor: P,
        fees: Arc<dyn FeeConfigProvider>,
        producers: EventProducers,
        config: SettlementConfig,
    ) -> Self {
        Self { db, processor, fees, producers, config }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

impl<B, P> SettlementApi<B, P>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
{
    /// Places an authorization hold for a card order. Capture is deferred until the order has been handed over.
    pub async fn authorize(
        &self,
        order_id: &OrderId,
        amount: Money,
        payment_token: &str,
    ) -> Result<PaymentHold, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::Validation(format!("Cannot authorize a non-positive amount ({amount})")));
        }
        let request = AuthorizationRequest {
            order_id: order_id.clone(),
            amount,
            currency: self.config.currency.clone(),
            payment_token: payment_token.to_string(),
            idempotency_key: format!("authorize-{order_id}"),
        };
        let result = self.processor.authorize(request).await.map_err(|e| {
            warn!("💳️ Authorization for order {order_id} failed: {e}");
            SettlementError::from(e)
        })?;
        let authorized_at = Utc::now();
        let expires_at = result.expires_at.unwrap_or(authorized_at + self.config.hold_validity);
        info!("💳️ Authorized {amount} for order {order_id}. Hold {} expires at {expires_at}", result.hold_ref);
        Ok(PaymentHold { hold_ref: result.hold_ref, status: HoldStatus::Held, amount, authorized_at, expires_at })
    }

    /// Guest checkout: authorize and capture straight away. The returned hold is already `captured`.
    pub async fn authorize_and_capture(
        &self,
        order_id: &OrderId,
        amount: Money,
        payment_token: &str,
    ) -> Result<PaymentHold, SettlementError> {
        let mut hold = self.authorize(order_id, amount, payment_token).await?;
        match self.processor.capture(&hold.hold_ref, amount, &format!("capture-{order_id}")).await {
            Ok(_) | Err(ProcessorError::AlreadyCaptured) => {
                info!("💳️ Guest payment for order {order_id} captured immediately");
                hold.status = HoldStatus::Captured;
                Ok(hold)
            },
            Err(e) => {
                warn!("💳️ Immediate capture for guest order {order_id} failed: {e}. Releasing the hold.");
                if let Err(re) = self.processor.release(&hold.hold_ref).await {
                    warn!("💳️ Could not release hold {}: {re}", hold.hold_ref);
                }
                Err(e.into())
            },
        }
    }

    /// Wraps a hold that the buyer's client obtained directly from the processor.
    pub fn external_hold(&self, hold_ref: &str, amount: Money) -> PaymentHold {
        let authorized_at = Utc::now();
        PaymentHold {
            hold_ref: hold_ref.to_string(),
            status: HoldStatus::Held,
            amount,
            authorized_at,
            expires_at: authorized_at + self.config.hold_validity,
        }
    }

    /// Captures the order's authorization hold. Idempotent, and safe to call concurrently: at most one call per order
    /// ever reaches the processor's capture operation.
    ///
    /// On success the seller's revenue is recognized and a payout is attempted. Processor failures are recorded on the
    /// order as `last_settlement_error` and returned; the order status is never rolled back.
    pub async fn capture(&self, order_id: &OrderId) -> Result<CaptureOutcome, SettlementError> {
        let order = self.fetch(order_id).await?;
        match order.payment_status {
            PaymentStatus::Captured | PaymentStatus::Refunded => {
                debug!("💳️ Order {order_id} is already {}. No capture needed.", order.payment_status);
                return Ok(CaptureOutcome::AlreadyCaptured);
            },
            PaymentStatus::Authorized if order.payment_method == PaymentMethod::ProcessorCard => {},
            other => return Ok(CaptureOutcome::NotApplicable { payment_status: other }),
        }
        let Some(claimed) = self.db.claim_capture(order_id, self.config.capture_lease).await? else {
            let current = self.fetch(order_id).await?;
            return if matches!(current.payment_status, PaymentStatus::Captured | PaymentStatus::Refunded) {
                Ok(CaptureOutcome::AlreadyCaptured)
            } else {
                debug!("💳️ Capture of order {order_id} is already in progress elsewhere");
                Ok(CaptureOutcome::InProgress)
            };
        };
        let Some(hold) = claimed.live_hold().cloned() else {
            self.db.release_capture_claim(order_id).await?;
            let msg = format!("Order {order_id} is authorized but has no live payment hold");
            self.flag_for_attention(&claimed, &msg).await;
            return Err(SettlementError::InconsistentState(msg));
        };
        if claimed.hold_expired(Utc::now()) {
            error!(
                "💳️ The hold on order {order_id} expired at {}. Attempting capture anyway; funds may be lost.",
                hold.expires_at
            );
        }
        let key = format!("capture-{order_id}");
        match self.processor.capture(&hold.hold_ref, claimed.total_amount, &key).await {
            Ok(result) => {
                debug!("💳️ Processor captured {} for order {order_id} ({})", result.amount, result.capture_ref);
            },
            Err(ProcessorError::AlreadyCaptured) => {
                info!("💳️ Processor reports order {order_id} as already captured. Treating as success.");
            },
            Err(e) => {
                warn!("💳️ Capture of order {order_id} failed: {e}");
                self.db.record_settlement_error(order_id, Some(format!("capture failed: {e}"))).await?;
                self.db.release_capture_claim(order_id).await?;
                return Err(e.into());
            },
        }
        let captured = match self.db.mark_payment_captured(order_id).await? {
            Some(order) => order,
            None => self.fetch(order_id).await?,
        };
        info!("💳️ Payment for order {order_id} captured ({})", captured.total_amount);
        if let Err(e) = self.settle(&captured).await {
            warn!("💳️ Order {order_id} was captured but settlement is incomplete: {e}");
            self.db.record_settlement_error(order_id, Some(format!("settlement incomplete: {e}"))).await?;
        }
        Ok(CaptureOutcome::Captured { order: Box::new(captured) })
    }

    /// Recognizes revenue, then pays out card earnings. Both steps are idempotent.
    pub async fn settle(&self, order: &Order) -> Result<(RevenueOutcome, PayoutOutcome), SettlementError> {
        let revenue = self.recognize_revenue(&order.order_id).await?;
        let payout = match &revenue {
            RevenueOutcome::Recognized { record } | RevenueOutcome::AlreadyRecognized { record } => {
                self.payout(&order.order_id, record).await?
            },
            RevenueOutcome::Deferred { .. } => PayoutOutcome::NotApplicable,
        };
        Ok((revenue, payout))
    }

    /// Credits the seller's wallet for this order, exactly once. The revenue record is the witness: if it exists,
    /// nothing is credited again.
    pub async fn recognize_revenue(&self, order_id: &OrderId) -> Result<RevenueOutcome, SettlementError> {
        if let Some(record) = self.db.fetch_revenue_record(order_id).await? {
            trace!("💳️ Revenue for {order_id} already recognized");
            return Ok(RevenueOutcome::AlreadyRecognized { record });
        }
        let order = self.fetch(order_id).await?;
        if !order.payment_status.is_settled() {
            debug!(
                "💳️ Revenue recognition for {order_id} deferred. Payment status is {}",
                order.payment_status
            );
            return Ok(RevenueOutcome::Deferred { payment_status: order.payment_status });
        }
        let current_rate = self.fees.commission_rate(&order.seller_id);
        let order = self.db.snapshot_commission_rate(order_id, current_rate).await?;
        let commission = order.commission_rate.unwrap_or(current_rate);
        let schedule = match order.payment_method {
            PaymentMethod::ProcessorCard => self.fees.fee_schedule(),
            PaymentMethod::InternalWallet => FeeSchedule::zero(),
        };
        let fees = calculate_with_schedule(order.total_amount, commission, &schedule);
        let mut delivery_deduction = order.absorbed_delivery_cost();
        if order.delivery_method == DeliveryMethod::ProfessionalDelivery {
            delivery_deduction += order.delivery_fee;
        }
        let mut net_amount = fees.net_amount - delivery_deduction;
        if net_amount.is_negative() {
            let msg = format!(
                "Fees and delivery costs for order {order_id} exceed the order total by {}. Seller credit capped at zero.",
                -net_amount
            );
            self.flag_for_attention(&order, &msg).await;
            net_amount = Money::default();
        }
        let record = RevenueRecord {
            order_id: order_id.clone(),
            seller_id: order.seller_id.clone(),
            subtotal: order.subtotal,
            delivery_fee: order.delivery_fee,
            total_amount: order.total_amount,
            platform_fee: fees.platform_fee,
            processing_fee: fees.processing_fee,
            delivery_deduction,
            net_amount,
            commission_bps: commission,
            order_created_at: order.created_at,
            recognized_at: Utc::now(),
        };
        let recognition = self.db.recognize_revenue(record).await?;
        if !recognition.newly_recognized {
            return Ok(RevenueOutcome::AlreadyRecognized { record: recognition.record });
        }
        let record = recognition.record;
        info!(
            "💳️ Revenue recognized for order {order_id}: net {} (commission {}, processing {})",
            record.net_amount, record.platform_fee, record.processing_fee
        );
        self.producers.publish(EventType::RevenueRecognized(RevenueRecognizedEvent { record: record.clone() })).await;
        Ok(RevenueOutcome::Recognized { record })
    }

    /// Sends card earnings to the seller's external payout destination. Wallet-funded orders are paid out of the
    /// internal ledger only.
    pub async fn payout(&self, order_id: &OrderId, record: &RevenueRecord) -> Result<PayoutOutcome, SettlementError> {
        let order = self.fetch(order_id).await?;
        if let Some(transfer_ref) = order.payout_transfer_ref {
            return Ok(PayoutOutcome::AlreadySent { transfer_ref });
        }
        if order.payment_method != PaymentMethod::ProcessorCard || !record.net_amount.is_positive() {
            return Ok(PayoutOutcome::NotApplicable);
        }
        let Some(destination) = self.db.fetch_payout_destination(&order.seller_id).await? else {
            warn!(
                "💳️ Inconsistent state: seller {} has no payout destination. Earnings for order {order_id} stay in \
                 the wallet until one is registered.",
                order.seller_id
            );
            return Ok(PayoutOutcome::NoDestination);
        };
        let key = format!("payout-{order_id}");
        let transfer = match self.processor.transfer(record.net_amount, &destination, &key).await {
            Ok(t) => t,
            Err(e) => {
                warn!("💳️ Payout for order {order_id} failed: {e}");
                self.db.record_settlement_error(order_id, Some(format!("payout failed: {e}"))).await?;
                return Ok(PayoutOutcome::Failed { reason: e.to_string() });
            },
        };
        if !self.db.record_payout_transfer(order_id, &transfer.transfer_ref).await? {
            let current = self.fetch(order_id).await?;
            let transfer_ref = current.payout_transfer_ref.unwrap_or(transfer.transfer_ref);
            return Ok(PayoutOutcome::AlreadySent { transfer_ref });
        }
        let entry = LedgerEntry::new(
            order.seller_id.clone(),
            record.net_amount,
            WalletTransactionType::Payout,
            format!("Payout for order {order_id}"),
        )
        .for_order(order_id)
        .with_idempotency_key(format!("payout:{order_id}"))
        .with_metadata(serde_json::json!({ "transfer_ref": transfer.transfer_ref }));
        if let Err(e) = self.db.debit(entry).await {
            let msg = format!("Payout {} for order {order_id} was sent but the wallet debit failed: {e}", transfer.transfer_ref);
            self.flag_for_attention(&order, &msg).await;
        }
        info!("💳️ Paid out {} for order {order_id} ({})", record.net_amount, transfer.transfer_ref);
        self.notify(
            order.seller_id.clone(),
            NotificationKind::PayoutSent,
            &order,
            serde_json::json!({ "amount": record.net_amount, "transfer_ref": transfer.transfer_ref }),
        )
        .await;
        Ok(PayoutOutcome::Sent { transfer_ref: transfer.transfer_ref })
    }

    /// Returns the buyer's money for an order that will not be fulfilled.
    ///
    /// Wallet payments are credited back in full. Card holds that were never captured are released; no funds moved,
    /// so nothing is transferred.
    pub async fn refund(&self, order_id: &OrderId, reason: &str) -> Result<RefundOutcome, SettlementError> {
        let order = self.fetch(order_id).await?;
        match (order.payment_method, order.payment_status) {
            (_, PaymentStatus::Refunded) => Ok(RefundOutcome::AlreadyRefunded),
            (PaymentMethod::InternalWallet, PaymentStatus::Paid) => {
                let entry = LedgerEntry::new(
                    order.buyer_id.clone(),
                    order.total_amount,
                    WalletTransactionType::Refund,
                    format!("Refund for order {order_id}: {reason}"),
                )
                .for_order(order_id)
                .with_idempotency_key(format!("refund:{order_id}"));
                self.db.credit(entry).await?;
                if self.db.update_payment_status(order_id, PaymentStatus::Paid, PaymentStatus::Refunded).await?.is_none() {
                    debug!("💳️ Payment status of {order_id} changed during refund");
                }
                info!("💳️ Refunded {} to wallet {} for order {order_id}", order.total_amount, order.buyer_id);
                self.notify(
                    order.buyer_id.clone(),
                    NotificationKind::RefundIssued,
                    &order,
                    serde_json::json!({ "amount": order.total_amount, "reason": reason }),
                )
                .await;
                Ok(RefundOutcome::WalletRefunded { amount: order.total_amount })
            },
            (PaymentMethod::ProcessorCard, PaymentStatus::Authorized) => {
                if let Some(hold) = order.live_hold() {
                    if let Err(e) = self.processor.release(&hold.hold_ref).await {
                        warn!("💳️ Could not release hold {} for order {order_id}: {e}. It will lapse.", hold.hold_ref);
                    }
                }
                match self.db.update_payment_status(order_id, PaymentStatus::Authorized, PaymentStatus::Refunded).await? {
                    Some(_) => {
                        info!("💳️ Hold for order {order_id} released: {reason}");
                        Ok(RefundOutcome::HoldReleased)
                    },
                    None => {
                        let current = self.fetch(order_id).await?;
                        if current.payment_status == PaymentStatus::Captured {
                            Ok(self.manual_refund(&current, reason).await)
                        } else {
                            Ok(RefundOutcome::AlreadyRefunded)
                        }
                    },
                }
            },
            (PaymentMethod::ProcessorCard, PaymentStatus::Captured) => Ok(self.manual_refund(&order, reason).await),
            _ => Ok(RefundOutcome::NothingToRefund),
        }
    }

    async fn manual_refund(&self, order: &Order, reason: &str) -> RefundOutcome {
        let msg = format!(
            "Captured card payment of {} for order {} must be refunded manually ({reason})",
            order.total_amount, order.order_id
        );
        self.flag_for_attention(order, &msg).await;
        RefundOutcome::ManualRefundRequired { amount: order.total_amount }
    }

    /// Credits a registered buyer's wallet, at most once per `key`. Guests have no wallet, so the amount is flagged
    /// for manual handling instead.
    pub async fn credit_buyer(
        &self,
        order: &Order,
        amount: Money,
        tx_type: WalletTransactionType,
        key: &str,
        description: &str,
    ) -> Result<bool, SettlementError> {
        if !amount.is_positive() {
            return Ok(false);
        }
        if order.is_guest {
            let msg = format!("Guest buyer is owed {amount} for order {} ({description})", order.order_id);
            self.flag_for_attention(order, &msg).await;
            return Ok(false);
        }
        let entry = LedgerEntry::new(order.buyer_id.clone(), amount, tx_type, description)
            .for_order(&order.order_id)
            .with_idempotency_key(key);
        let (_, applied) = self.db.credit(entry).await?;
        Ok(applied)
    }

    /// Captures every authorized order that was fulfilled or completed at least `older_than` ago.
    pub async fn sweep(&self, older_than: Duration) -> Result<Vec<SweepEntry>, SettlementError> {
        let stale = self.db.fetch_stale_authorized_orders(older_than).await?;
        info!("🕰️ Capture sweep found {} stale authorized orders", stale.len());
        let now = Utc::now();
        let mut results = Vec::with_capacity(stale.len());
        for order in stale {
            let result = if order.hold_expired(now) {
                let msg = format!("Hold for order {} expired before capture", order.order_id);
                self.flag_for_attention(&order, &msg).await;
                SweepResult::HoldExpired
            } else {
                match self.capture(&order.order_id).await {
                    Ok(CaptureOutcome::Captured { .. }) => SweepResult::Captured,
                    Ok(CaptureOutcome::AlreadyCaptured) | Ok(CaptureOutcome::NotApplicable { .. }) => {
                        SweepResult::AlreadyCaptured
                    },
                    Ok(CaptureOutcome::InProgress) => SweepResult::InProgress,
                    Err(e) => SweepResult::Failed { reason: e.to_string() },
                }
            };
            debug!("🕰️ Sweep result for {}: {result:?}", order.order_id);
            results.push(SweepEntry { order_id: order.order_id, result });
        }
        Ok(results)
    }

    async fn fetch(&self, order_id: &OrderId) -> Result<Order, SettlementError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))
    }

    /// Logs an inconsistent state for manual remediation, stores it on the order and alerts operators.
    pub(crate) async fn flag_for_attention(&self, order: &Order, message: &str) {
        error!("💳️ Inconsistent state on order {}: {message}", order.order_id);
        if let Err(e) = self.db.record_settlement_error(&order.order_id, Some(message.to_string())).await {
            error!("💳️ Could not record settlement error on order {}: {e}", order.order_id);
        }
        self.notify(
            operations_account(),
            NotificationKind::SettlementAttentionRequired,
            order,
            serde_json::json!({ "message": message }),
        )
        .await;
    }

    pub(crate) async fn notify(
        &self,
        recipient: AccountId,
        kind: NotificationKind,
        order: &Order,
        payload: serde_json::Value,
    ) {
        let event = NotificationEvent::new(recipient, kind, Some(order.order_id.clone()), payload);
        self.producers.publish(EventType::Notification(event)).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db_types::{DeliveryMethod, FulfillmentType, NewProduct, OrderStatus, ProductId},
        engine_api::order_flow_api::{EngineConfig, OrderFlowApi},
        order_objects::{CheckoutItem, CheckoutRequest, StatusUpdateRequest},
        test_utils::{
            doubles::{FakeCourier, FakeProcessor},
            prepare_env::fresh_database,
        },
        traits::MockFeeConfigProvider,
    };
    use settle_common::Rate;

    #[tokio::test]
    async fn commission_is_looked_up_once_and_wallet_orders_skip_processing_fees() {
        let mut fees = MockFeeConfigProvider::new();
        fees.expect_commission_rate().times(1).returning(|_| Rate::from_percent(10));
        fees.expect_fee_schedule().never();
        let db = fresh_database().await;
        let api = OrderFlowApi::new(
            db,
            FakeProcessor::new(),
            FakeCourier::default(),
            Arc::new(fees),
            EventProducers::default(),
            EngineConfig::default(),
        );
        let product = NewProduct {
            product_id: ProductId::from("jug"),
            seller_id: AccountId::from("potter"),
            fulfillment_type: FulfillmentType::ReadyToShip,
            stock: 2,
            available_quantity: 2,
            production_capacity: 0,
            slots: vec![],
        };
        api.inventory().upsert_product(product).await.unwrap();
        let alice = AccountId::from("alice");
        let top_up = LedgerEntry::new(alice.clone(), Money::from_cents(5000), WalletTransactionType::TransferIn, "Top up")
            .with_idempotency_key("topup:alice");
        api.wallet().credit(top_up).await.unwrap();

        let request = CheckoutRequest {
            order_id: Some(OrderId::from("ord-jug")),
            buyer_id: Some(alice),
            is_guest: false,
            seller_id: None,
            items: vec![CheckoutItem {
                product_id: ProductId::from("jug"),
                quantity: 1,
                unit_price: Money::from_cents(2000),
                fulfillment_type: FulfillmentType::ReadyToShip,
                seller_id: Some(AccountId::from("potter")),
                schedule_slot: None,
            }],
            payment_method: PaymentMethod::InternalWallet,
            payment_token: None,
            hold_ref: None,
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: None,
            delivery_fee: Money::default(),
            delivery_pricing: None,
            subtotal: None,
            total_amount: None,
        };
        let order_id = OrderId::from("ord-jug");
        api.create_order(request).await.unwrap();
        for status in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::ReadyForPickup, OrderStatus::PickedUp] {
            api.update_status(&order_id, StatusUpdateRequest { status, reason: None }).await.unwrap();
        }

        let first = api.settlement().recognize_revenue(&order_id).await.unwrap();
        let second = api.settlement().recognize_revenue(&order_id).await.unwrap();
        let record = match (first, second) {
            (
                RevenueOutcome::Recognized { record } | RevenueOutcome::AlreadyRecognized { record },
                RevenueOutcome::AlreadyRecognized { .. },
            ) => record,
            other => panic!("Unexpected outcomes {other:?}"),
        };
        assert_eq!(record.platform_fee, Money::from_cents(200));
        assert_eq!(record.processing_fee, Money::default());
        assert_eq!(record.net_amount, Money::from_cents(1800));
        assert_eq!(record.commission_bps, Rate::from_percent(10));
    }
}
