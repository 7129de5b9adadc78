use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
};
use serde_json::json;
use settle_common::Money;
use settlement_engine::db_types::CourierStatus;

use super::helpers::{TestContext, WEBHOOK_SECRET};
use crate::{helpers::calculate_hmac, middleware::COURIER_SIGNATURE_HEADER};

/// Places a professional-delivery order and moves it to `ready_for_delivery`, which books the courier.
async fn order_out_for_delivery(ctx: &TestContext, order_id: &str) {
    ctx.stock("vase", "potter", 1).await;
    ctx.top_up("alice", 5000).await;
    let checkout = json!({
        "orderId": order_id,
        "buyerId": "alice",
        "items": [{
            "productId": "vase",
            "quantity": 1,
            "unitPrice": 2000,
            "fulfillmentType": "ready_to_ship",
            "sellerId": "potter"
        }],
        "paymentMethod": "internal_wallet",
        "deliveryMethod": "professional_delivery",
        "deliveryAddress": "1 Main St",
        "deliveryFee": 1200,
        "deliveryPricing": { "estimatedFee": 1000 }
    });
    let (status, body) = ctx.send(TestRequest::post().uri("/orders").set_json(&checkout)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    ctx.set_status(order_id, &["confirmed", "preparing", "ready_for_delivery"]).await;
}

fn signed_webhook(body: &str, signature: Option<String>) -> TestRequest {
    let mut req = TestRequest::post()
        .uri("/orders/delivery-webhook")
        .insert_header(ContentType::json())
        .set_payload(body.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((COURIER_SIGNATURE_HEADER, signature));
    }
    req
}

#[actix_web::test]
async fn signed_delivery_webhook_completes_the_order() {
    let ctx = TestContext::new().await;
    order_out_for_delivery(&ctx, "ord-web").await;
    let (_, order) = ctx.send_json(TestRequest::get().uri("/orders/ord-web")).await;
    assert_eq!(order["status"], "out_for_delivery");
    assert_eq!(order["courier_delivery"]["delivery_id"], "dlv_ord-web");
    assert_eq!(ctx.courier.create_calls(), 1);

    let body = json!({ "deliveryId": "dlv_ord-web", "status": "delivered" }).to_string();
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let (status, order) = ctx.send_json(signed_webhook(&body, Some(signature.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");

    // Couriers retry webhooks. A repeat is harmless.
    let (status, order) = ctx.send_json(signed_webhook(&body, Some(signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");
    let (_, wallet) = ctx.send_json(TestRequest::get().uri("/wallets/potter")).await;
    assert_eq!(wallet["transactions"].as_array().map(|t| t.len()), Some(1));
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let ctx = TestContext::new().await;
    order_out_for_delivery(&ctx, "ord-forged").await;
    let body = json!({ "deliveryId": "dlv_ord-forged", "status": "delivered" }).to_string();

    let (status, _) = ctx.send(signed_webhook(&body, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let forged = calculate_hmac("not-the-secret", body.as_bytes());
    let (status, _) = ctx.send(signed_webhook(&body, Some(forged))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, order) = ctx.send_json(TestRequest::get().uri("/orders/ord-forged")).await;
    assert_eq!(order["status"], "out_for_delivery");
}

#[actix_web::test]
async fn webhook_for_unknown_delivery() {
    let ctx = TestContext::new().await;
    let body = json!({ "deliveryId": "dlv_nobody", "status": "pickup" }).to_string();
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = ctx.send(signed_webhook(&body, Some(signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("dlv_nobody"));
}

#[actix_web::test]
async fn expensive_courier_waits_for_the_artisan() {
    let ctx = TestContext::new().await;
    ctx.courier.set_quote_fee(Money::from_cents(1500));
    order_out_for_delivery(&ctx, "ord-dear").await;
    let (_, order) = ctx.send_json(TestRequest::get().uri("/orders/ord-dear")).await;
    assert_eq!(order["status"], "ready_for_delivery");
    assert_eq!(order["cost_absorption"]["excess_amount"], 300);

    let (status, order) = ctx
        .send_json(
            TestRequest::post()
                .uri("/orders/ord-dear/artisan-cost-response")
                .set_json(json!({ "response": "accepted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "out_for_delivery");
    assert_eq!(ctx.courier.create_calls(), 1);

    ctx.courier.set_status("dlv_ord-dear", CourierStatus::Dropoff);
    let (status, order) = ctx.send_json(TestRequest::post().uri("/orders/ord-dear/refresh-delivery")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["courier_delivery"]["status"], "dropoff");
}
