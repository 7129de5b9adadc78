use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{pickup_checkout, TestContext};

#[actix_web::test]
async fn health_check() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn wallet_checkout_is_created_once() {
    let ctx = TestContext::new().await;
    ctx.stock("vase", "potter", 3).await;
    ctx.top_up("alice", 5000).await;
    let body = pickup_checkout("ord-1", "internal_wallet", 2000);

    let (status, order) = ctx.send_json(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["order_id"], "ord-1");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["total_amount"], 2000);

    let (status, order) = ctx.send_json(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_id"], "ord-1");

    let (_, wallet) = ctx.send_json(TestRequest::get().uri("/wallets/alice")).await;
    assert_eq!(wallet["balance"], 3000);
    let (_, product) = ctx.send_json(TestRequest::put().uri("/products/vase").set_json(json!({
        "sellerId": "potter",
        "fulfillmentType": "ready_to_ship",
        "stock": 10
    })))
    .await;
    assert_eq!(product["available_quantity"], 10);
}

#[actix_web::test]
async fn wallet_checkout_without_funds_is_refused() {
    let ctx = TestContext::new().await;
    ctx.stock("vase", "potter", 3).await;
    ctx.top_up("alice", 500).await;
    let body = pickup_checkout("ord-poor", "internal_wallet", 2000);
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    assert!(body.contains("error"));

    let (status, _) = ctx.send(TestRequest::get().uri("/orders/ord-poor")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, wallet) = ctx.send_json(TestRequest::get().uri("/wallets/alice")).await;
    assert_eq!(wallet["balance"], 500);
    // The reservation was released, so the whole stock can still be sold
    ctx.top_up("bob", 10_000).await;
    let mut bulk = pickup_checkout("ord-bulk", "internal_wallet", 2000);
    bulk["buyerId"] = json!("bob");
    bulk["items"][0]["quantity"] = json!(3);
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&bulk)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[actix_web::test]
async fn malformed_checkout_is_a_bad_request() {
    let ctx = TestContext::new().await;
    let mut body = pickup_checkout("ord-bad", "internal_wallet", 2000);
    body["items"] = json!([]);
    let (status, _) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn buyer_cancels_pending_order_and_is_refunded() {
    let ctx = TestContext::new().await;
    ctx.stock("vase", "potter", 1).await;
    ctx.top_up("alice", 5000).await;
    let body = pickup_checkout("ord-2", "internal_wallet", 2000);
    let (status, _) = ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .send(TestRequest::put().uri("/orders/ord-2/cancel").set_json(json!({ "buyerId": "mallory" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = ctx
        .send_json(
            TestRequest::put().uri("/orders/ord-2/cancel").set_json(json!({ "buyerId": "alice", "reason": "Gift" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "refunded");
    let (_, wallet) = ctx.send_json(TestRequest::get().uri("/wallets/alice")).await;
    assert_eq!(wallet["balance"], 5000);

    let (status, body) = ctx
        .send(TestRequest::put().uri("/orders/ord-2/cancel").set_json(json!({ "buyerId": "alice" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[actix_web::test]
async fn lifecycle_rejects_skipped_steps() {
    let ctx = TestContext::new().await;
    ctx.stock("vase", "potter", 1).await;
    ctx.top_up("alice", 5000).await;
    let body = pickup_checkout("ord-3", "internal_wallet", 2000);
    ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;

    let (status, _) = ctx
        .send(TestRequest::put().uri("/orders/ord-3/status").set_json(json!({ "status": "picked_up" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = ctx
        .send(TestRequest::put().uri("/orders/ord-3/status").set_json(json!({ "status": "declined" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ctx
        .send(TestRequest::put().uri("/orders/ord-3/status").set_json(json!({ "status": "ready_for_delivery" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn buyer_confirmation_completes_and_credits_the_seller() {
    let ctx = TestContext::new().await;
    ctx.stock("vase", "potter", 1).await;
    ctx.top_up("alice", 5000).await;
    let body = pickup_checkout("ord-4", "internal_wallet", 2000);
    ctx.send(TestRequest::post().uri("/orders").set_json(&body)).await;
    ctx.set_status("ord-4", &["confirmed", "preparing", "ready_for_pickup", "picked_up"]).await;

    let (status, order) = ctx
        .send_json(TestRequest::put().uri("/orders/ord-4/confirm-receipt").set_json(json!({ "buyerId": "alice" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");

    let (status, revenue) = ctx.send_json(TestRequest::get().uri("/orders/ord-4/revenue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revenue["platform_fee"], 200);
    assert_eq!(revenue["net_amount"], 1800);
    let (_, wallet) = ctx.send_json(TestRequest::get().uri("/wallets/potter")).await;
    assert_eq!(wallet["balance"], 1800);

    let (status, orders) = ctx.send_json(TestRequest::get().uri("/orders?sellerId=potter&status=completed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().map(|a| a.len()), Some(1));
    let (_, orders) = ctx.send_json(TestRequest::get().uri("/orders?buyerId=bob")).await;
    assert_eq!(orders.as_array().map(|a| a.len()), Some(0));
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(TestRequest::get().uri("/orders/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("nope"));
    let (status, _) = ctx.send(TestRequest::post().uri("/orders/nope/capture-payment")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send(TestRequest::get().uri("/orders/nope/revenue")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn payout_destination_cannot_be_blank() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx
        .send(TestRequest::put().uri("/sellers/potter/payout-destination").set_json(json!({ "destination": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = ctx
        .send_json(
            TestRequest::put().uri("/sellers/potter/payout-destination").set_json(json!({ "destination": "acct_123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn delivery_quote_adds_the_buffer() {
    let ctx = TestContext::new().await;
    let (status, quote) = ctx
        .send_json(TestRequest::post().uri("/delivery-quotes").set_json(json!({
            "sellerId": "potter",
            "buyerId": "alice",
            "dropoffAddress": "1 Main St",
            "orderValue": 2000
        })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["estimatedFee"], 1000);
    assert_eq!(quote["chargedAmount"], 1200);
    assert_eq!(ctx.courier.quote_calls(), 1);

    ctx.courier.set_unavailable(true);
    let (status, _) = ctx
        .send(TestRequest::post().uri("/delivery-quotes").set_json(json!({
            "sellerId": "potter",
            "buyerId": "alice",
            "dropoffAddress": "1 Main St",
            "orderValue": 2000
        })))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
