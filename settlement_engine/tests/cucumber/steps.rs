use cucumber::{then, when};
use settlement_engine::{
    db_types::{
        AccountId,
        ArtisanResponse,
        CourierStatus,
        OrderId,
        OrderStatus,
        PaymentMethod,
        PaymentStatus,
        ProductId,
        WalletTransactionType,
    },
    order_objects::{CourierStatusUpdate, StatusUpdateRequest},
    SettlementError,
};

use crate::cucumber::{
    settlement_world::{checkout, money, with_courier},
    SettlementWorld,
};

fn status(s: &str) -> OrderStatus {
    s.parse().unwrap_or_else(|e| panic!("{s} is not an order status: {e}"))
}

//----------------------------------------------   Checkout   ----------------------------------------------------

#[when(expr = "{string} pays by card for order {string} of {int} x {string} at {word}")]
async fn card_order(world: &mut SettlementWorld, buyer: String, order: String, qty: i64, product: String, price: String) {
    let request = checkout(&order, Some(&buyer), &product, qty, money(&price), PaymentMethod::ProcessorCard);
    let result = world.api().create_order(request).await;
    world.record(result);
}

#[when(expr = "a guest pays by card for order {string} of {int} x {string} at {word}")]
async fn guest_order(world: &mut SettlementWorld, order: String, qty: i64, product: String, price: String) {
    let request = checkout(&order, None, &product, qty, money(&price), PaymentMethod::ProcessorCard);
    let result = world.api().create_order(request).await;
    world.record(result);
}

#[when(expr = "{string} pays from their wallet for order {string} of {int} x {string} at {word}")]
async fn wallet_order(world: &mut SettlementWorld, buyer: String, order: String, qty: i64, product: String, price: String) {
    let request = checkout(&order, Some(&buyer), &product, qty, money(&price), PaymentMethod::InternalWallet);
    let result = world.api().create_order(request).await;
    world.record(result);
}

#[when(
    expr = "{string} pays from their wallet for courier order {string} of {int} x {string} at {word} with an \
            estimate of {word} charged at {word}"
)]
#[allow(clippy::too_many_arguments)]
async fn courier_order(
    world: &mut SettlementWorld,
    buyer: String,
    order: String,
    qty: i64,
    product: String,
    price: String,
    estimate: String,
    charged: String,
) {
    let request = checkout(&order, Some(&buyer), &product, qty, money(&price), PaymentMethod::InternalWallet);
    let request = with_courier(request, money(&estimate), money(&charged));
    let result = world.api().create_order(request).await;
    world.record(result);
}

//----------------------------------------------   Transitions   -------------------------------------------------

#[when(expr = "the seller moves order {string} through {word}")]
async fn move_through(world: &mut SettlementWorld, order: String, statuses: String) {
    let order_id = OrderId::from(order.as_str());
    for s in statuses.split(',') {
        let request = StatusUpdateRequest { status: status(s), reason: None };
        let result = world.api().update_status(&order_id, request).await;
        if world.record(result).is_none() {
            break;
        }
    }
}

#[when(expr = "the seller declines order {string} because {string}")]
async fn decline(world: &mut SettlementWorld, order: String, reason: String) {
    let request = StatusUpdateRequest { status: OrderStatus::Declined, reason: Some(reason) };
    let result = world.api().update_status(&OrderId::from(order.as_str()), request).await;
    world.record(result);
}

#[when(expr = "the seller declines order {string} without a reason")]
async fn decline_without_reason(world: &mut SettlementWorld, order: String) {
    let request = StatusUpdateRequest { status: OrderStatus::Declined, reason: None };
    let result = world.api().update_status(&OrderId::from(order.as_str()), request).await;
    world.record(result);
}

#[when(expr = "{string} cancels order {string}")]
async fn buyer_cancels(world: &mut SettlementWorld, buyer: String, order: String) {
    let result =
        world.api().cancel_by_buyer(&OrderId::from(order.as_str()), &AccountId::from(buyer.as_str()), None).await;
    world.record(result);
}

#[when(expr = "{string} confirms receipt of order {string}")]
async fn confirm_receipt(world: &mut SettlementWorld, buyer: String, order: String) {
    let result = world.api().confirm_receipt(&OrderId::from(order.as_str()), &AccountId::from(buyer.as_str())).await;
    world.record(result);
}

#[when(expr = "payment for order {string} is captured manually")]
async fn manual_capture(world: &mut SettlementWorld, order: String) {
    let result = world.api().capture_payment(&OrderId::from(order.as_str())).await;
    world.record(result);
}

#[when(expr = "the seller {word} the extra delivery cost for order {string}")]
async fn cost_response(world: &mut SettlementWorld, response: String, order: String) {
    let response: ArtisanResponse = response.parse().expect("accepted or declined");
    let result = world.api().respond_to_delivery_cost(&OrderId::from(order.as_str()), response).await;
    world.record(result);
}

#[when(expr = "the courier reports order {string} as {word}")]
async fn courier_report(world: &mut SettlementWorld, order: String, courier_status: String) {
    let courier_status: CourierStatus = courier_status.parse().expect("a courier status");
    let update = CourierStatusUpdate {
        delivery_id: format!("dlv_{order}"),
        status: courier_status,
        tracking_url: None,
        courier: None,
        eta: None,
    };
    let result = world.api().handle_courier_update(update).await;
    world.record(result);
}

//----------------------------------------------   Checks   ------------------------------------------------------

#[then(expr = "order {string} is {word}")]
async fn order_status(world: &mut SettlementWorld, order: String, expected: String) {
    let order = world.order(&order).await;
    assert_eq!(order.status, status(&expected), "last error: {:?}", world.last_error);
}

#[then(expr = "order {string} has payment status {word}")]
async fn payment_status(world: &mut SettlementWorld, order: String, expected: String) {
    let order = world.order(&order).await;
    let expected: PaymentStatus = expected.parse().expect("a payment status");
    assert_eq!(order.payment_status, expected);
}

#[then(expr = "order {string} does not exist")]
async fn order_missing(world: &mut SettlementWorld, order: String) {
    let found = world.api().fetch_order(&OrderId::from(order.as_str())).await.expect("Error fetching order");
    assert!(found.is_none(), "Order {order} should not exist");
}

#[then(expr = "the last request was refused as {word}")]
async fn refused(world: &mut SettlementWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    let matched = match kind.as_str() {
        "invalid_transition" => matches!(err, SettlementError::InvalidTransition { .. }),
        "validation" => matches!(err, SettlementError::Validation(_)),
        "insufficient_funds" => matches!(err, SettlementError::InsufficientFunds { .. }),
        other => panic!("Unknown error kind {other}"),
    };
    assert!(matched, "Expected {kind}, got {err}");
}

#[then(expr = "the wallet of {string} holds {word}")]
async fn wallet_holds(world: &mut SettlementWorld, account: String, amount: String) {
    let balance = world.api().wallet().balance(&AccountId::from(account.as_str())).await.expect("Error fetching balance");
    assert_eq!(balance, money(&amount));
}

#[then(expr = "the wallet of {string} matches its transaction log")]
async fn wallet_matches_log(world: &mut SettlementWorld, account: String) {
    let statement =
        world.api().wallet().statement(&AccountId::from(account.as_str())).await.expect("Error fetching statement");
    let sum: settle_common::Money = statement.transactions.iter().map(|tx| tx.amount).sum();
    assert_eq!(statement.balance, sum);
}

#[then(expr = "{string} has {int} {word} transaction(s)")]
async fn transaction_count(world: &mut SettlementWorld, account: String, count: usize, tx_type: String) {
    let tx_type: WalletTransactionType = tx_type.parse().expect("a transaction type");
    let statement =
        world.api().wallet().statement(&AccountId::from(account.as_str())).await.expect("Error fetching statement");
    let n = statement.transactions.iter().filter(|tx| tx.tx_type == tx_type).count();
    assert_eq!(n, count, "{account} has {n} {tx_type} transactions");
}

#[then(expr = "order {string} recognized revenue with platform fee {word}, processing fee {word} and net {word}")]
async fn revenue(world: &mut SettlementWorld, order: String, platform: String, processing: String, net: String) {
    let record = world
        .api()
        .revenue_record(&OrderId::from(order.as_str()))
        .await
        .expect("Error fetching revenue record")
        .expect("No revenue record");
    assert_eq!(record.platform_fee, money(&platform));
    assert_eq!(record.processing_fee, money(&processing));
    assert_eq!(record.net_amount, money(&net));
}

#[then(expr = "order {string} has a delivery deduction of {word}")]
async fn delivery_deduction(world: &mut SettlementWorld, order: String, amount: String) {
    let record = world
        .api()
        .revenue_record(&OrderId::from(order.as_str()))
        .await
        .expect("Error fetching revenue record")
        .expect("No revenue record");
    assert_eq!(record.delivery_deduction, money(&amount));
}

#[then(expr = "order {string} has no revenue record")]
async fn no_revenue(world: &mut SettlementWorld, order: String) {
    let record =
        world.api().revenue_record(&OrderId::from(order.as_str())).await.expect("Error fetching revenue record");
    assert!(record.is_none());
}

#[then(expr = "the seller has {int} revenue record(s)")]
async fn revenue_count(world: &mut SettlementWorld, count: usize) {
    let records =
        world.api().revenue_for_seller(&AccountId::from("potter")).await.expect("Error fetching revenue records");
    assert_eq!(records.len(), count);
}

#[then(expr = "the processor was asked to capture {int} time(s)")]
async fn captures(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.system().processor.capture_calls(), count);
}

#[then(expr = "the processor paid out {int} time(s)")]
async fn payouts(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.system().processor.transfers().len(), count);
}

#[then(expr = "product {string} has {int} left")]
async fn stock_left(world: &mut SettlementWorld, product: String, left: i64) {
    let product = world
        .api()
        .inventory()
        .product(&ProductId::from(product.as_str()))
        .await
        .expect("Error fetching product")
        .expect("No such product");
    assert_eq!(product.stock, left);
    assert_eq!(product.available_quantity, left);
}

#[then(expr = "product {string} is {word}")]
async fn product_status(world: &mut SettlementWorld, product: String, expected: String) {
    let product = world
        .api()
        .inventory()
        .product(&ProductId::from(product.as_str()))
        .await
        .expect("Error fetching product")
        .expect("No such product");
    assert_eq!(product.status.to_string(), expected);
}

#[then(expr = "order {string} is waiting for the seller to absorb {word}")]
async fn awaiting_absorption(world: &mut SettlementWorld, order: String, excess: String) {
    let order = world.order(&order).await;
    assert_eq!(order.status, OrderStatus::ReadyForDelivery);
    let absorption = order.cost_absorption.expect("No cost absorption");
    assert!(absorption.required);
    assert_eq!(absorption.artisan_response, ArtisanResponse::Pending);
    assert_eq!(absorption.excess_amount, money(&excess));
    assert!(order.courier_delivery.is_none());
}

#[then(expr = "order {string} has a courier booked")]
async fn courier_booked(world: &mut SettlementWorld, order: String) {
    let order = world.order(&order).await;
    let delivery = order.courier_delivery.expect("No courier booked");
    assert_eq!(delivery.delivery_id, format!("dlv_{}", order.order_id));
}
