use std::{sync::Arc, time::Duration as StdDuration};

use futures_util::future::join_all;
use settle_common::{Money, Rate};
use settlement_engine::{
    db_types::{
        AccountId,
        DeliveryMethod,
        FulfillmentType,
        LedgerEntry,
        NewProduct,
        OrderId,
        OrderStatus,
        PaymentMethod,
        PaymentStatus,
        ProductId,
        WalletTransactionType,
    },
    events::EventProducers,
    order_objects::{CheckoutItem, CheckoutRequest, StatusUpdateRequest},
    test_utils::{
        doubles::{FakeCourier, FakeProcessor},
        prepare_env::fresh_database,
    },
    traits::ProcessorError,
    CaptureOutcome,
    EngineConfig,
    FeeSchedule,
    OrderFlowApi,
    SettlementError,
    SqliteDatabase,
    StaticFeeConfig,
};

type Api = OrderFlowApi<SqliteDatabase, FakeProcessor, FakeCourier>;

async fn setup() -> (Api, FakeProcessor) {
    let db = fresh_database().await;
    let processor = FakeProcessor::new();
    let fees = StaticFeeConfig::new(Rate::from_percent(15), FeeSchedule::default());
    let api = OrderFlowApi::new(
        db,
        processor.clone(),
        FakeCourier::default(),
        Arc::new(fees),
        EventProducers::default(),
        EngineConfig::default(),
    );
    let product = NewProduct {
        product_id: ProductId::from("vase"),
        seller_id: AccountId::from("potter"),
        fulfillment_type: FulfillmentType::ReadyToShip,
        stock: 5,
        available_quantity: 5,
        production_capacity: 0,
        slots: vec![],
    };
    api.inventory().upsert_product(product).await.expect("Error storing product");
    (api, processor)
}

fn cart(order_id: &str, method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        order_id: Some(OrderId::from(order_id)),
        buyer_id: Some(AccountId::from("alice")),
        is_guest: false,
        seller_id: None,
        items: vec![CheckoutItem {
            product_id: ProductId::from("vase"),
            quantity: 1,
            unit_price: Money::from_cents(5000),
            fulfillment_type: FulfillmentType::ReadyToShip,
            seller_id: Some(AccountId::from("potter")),
            schedule_slot: None,
        }],
        payment_method: method,
        payment_token: Some("tok_visa".into()),
        hold_ref: None,
        delivery_method: DeliveryMethod::Pickup,
        delivery_address: None,
        delivery_fee: Money::default(),
        delivery_pricing: None,
        subtotal: None,
        total_amount: None,
    }
}

async fn hand_over(api: &Api, order_id: &OrderId) {
    for status in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::ReadyForPickup, OrderStatus::PickedUp] {
        api.update_status(order_id, StatusUpdateRequest { status, reason: None }).await.expect("Status update failed");
    }
}

#[tokio::test]
async fn concurrent_capture_triggers_reach_the_processor_once() {
    let (api, processor) = setup().await;
    let order_id = OrderId::from("ord-race");
    api.create_order(cart("ord-race", PaymentMethod::ProcessorCard)).await.expect("checkout");
    // The capture on handover fails, leaving the order authorized for the racing triggers below
    processor.fail_next_capture(ProcessorError::Retryable("gateway timeout".into()));
    hand_over(&api, &order_id).await;
    assert_eq!(processor.capture_calls(), 1);

    processor.set_capture_delay(StdDuration::from_millis(150));
    let triggers = (0..6).map(|_| api.capture_payment(&order_id));
    let outcomes = join_all(triggers).await;

    let captured = outcomes.iter().filter(|o| matches!(o, Ok(CaptureOutcome::Captured { .. }))).count();
    assert_eq!(captured, 1, "outcomes: {outcomes:?}");
    assert!(outcomes.iter().all(|o| matches!(
        o,
        Ok(CaptureOutcome::Captured { .. } | CaptureOutcome::InProgress | CaptureOutcome::AlreadyCaptured)
    )));
    assert_eq!(processor.capture_calls(), 2);

    let order = api.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Captured);
    assert!(order.capture_claimed_at.is_none());
    assert_eq!(api.revenue_for_seller(&AccountId::from("potter")).await.unwrap().len(), 1);
    let earnings = api
        .wallet()
        .statement(&AccountId::from("potter"))
        .await
        .unwrap()
        .transactions
        .into_iter()
        .filter(|tx| tx.tx_type == WalletTransactionType::Earning)
        .count();
    assert_eq!(earnings, 1);
}

#[tokio::test]
async fn only_one_buyer_confirmation_completes_the_order() {
    let (api, _) = setup().await;
    let order_id = OrderId::from("ord-confirm");
    let alice = AccountId::from("alice");
    let entry = LedgerEntry::new(alice.clone(), Money::from_cents(10_000), WalletTransactionType::TransferIn, "Top up")
        .with_idempotency_key("topup:alice");
    api.wallet().credit(entry).await.expect("top up");
    api.create_order(cart("ord-confirm", PaymentMethod::InternalWallet)).await.expect("checkout");
    hand_over(&api, &order_id).await;

    let results = join_all((0..4).map(|_| api.confirm_receipt(&order_id, &alice))).await;
    let completed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(completed, 1, "results: {results:?}");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SettlementError::InvalidTransition { .. })));

    let order = api.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(api.revenue_for_seller(&AccountId::from("potter")).await.unwrap().len(), 1);
    assert_eq!(api.wallet().balance(&AccountId::from("potter")).await.unwrap(), Money::from_cents(4250));
}

#[tokio::test]
async fn duplicate_checkouts_charge_and_reserve_once() {
    let (api, _) = setup().await;
    let alice = AccountId::from("alice");
    let entry = LedgerEntry::new(alice.clone(), Money::from_cents(10_000), WalletTransactionType::TransferIn, "Top up")
        .with_idempotency_key("topup:alice");
    api.wallet().credit(entry).await.expect("top up");

    let results = join_all((0..3).map(|_| api.create_order(cart("ord-dup", PaymentMethod::InternalWallet)))).await;
    let created = results.iter().filter(|r| matches!(r, Ok((_, true)))).count();
    assert_eq!(created, 1, "results: {results:?}");
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(api.wallet().balance(&alice).await.unwrap(), Money::from_cents(5000));
    let product = api.inventory().product(&ProductId::from("vase")).await.unwrap().unwrap();
    assert_eq!(product.stock, 4);
    assert_eq!(product.available_quantity, 4);
}
