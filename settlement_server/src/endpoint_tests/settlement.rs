use actix_web::{http::StatusCode, test::TestRequest};
use settlement_engine::traits::ProcessorError;

use super::helpers::{pickup_checkout, TestContext, SWEEP_TOKEN};

/// A card order that was picked up, but whose capture at handover failed.
async fn uncaptured_card_order(ctx: &TestContext, order_id: &str) {
    ctx.stock("vase", "potter", 1).await;
    let body = pickup_checkout(order_id, "processor_card", 2000);
    let (status, order) = ctx.send_json(TestRequest::post().uri("/orders").set_json(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["payment_status"], "authorized");
    ctx.processor.fail_next_capture(ProcessorError::Retryable("gateway timeout".into()));
    ctx.set_status(order_id, &["confirmed", "preparing", "ready_for_pickup", "picked_up"]).await;
}

#[actix_web::test]
async fn manual_capture_is_idempotent() {
    let ctx = TestContext::new().await;
    uncaptured_card_order(&ctx, "ord-card").await;
    let (_, order) = ctx.send_json(TestRequest::get().uri("/orders/ord-card")).await;
    assert_eq!(order["payment_status"], "authorized");
    assert!(order["last_settlement_error"].as_str().is_some());

    let (status, outcome) = ctx.send_json(TestRequest::post().uri("/orders/ord-card/capture-payment")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "captured");
    let (status, outcome) = ctx.send_json(TestRequest::post().uri("/orders/ord-card/capture-payment")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "already_captured");
    // One failed attempt at handover, one success
    assert_eq!(ctx.processor.capture_calls(), 2);
}

#[actix_web::test]
async fn sweep_needs_the_bearer_token() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(TestRequest::post().uri("/orders/auto-capture-payments")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx
        .send(
            TestRequest::post()
                .uri("/orders/auto-capture-payments")
                .insert_header(("Authorization", "Bearer guess")),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.processor.capture_calls(), 0);
}

#[actix_web::test]
async fn sweep_captures_stale_authorizations() {
    let ctx = TestContext::new().await;
    uncaptured_card_order(&ctx, "ord-stale").await;
    let auth = ("Authorization", format!("Bearer {SWEEP_TOKEN}"));

    // Nothing is 72 hours old yet
    let (status, sweep) = ctx
        .send_json(TestRequest::post().uri("/orders/auto-capture-payments").insert_header(auth.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sweep["processed"], 0);

    let (status, sweep) = ctx
        .send_json(
            TestRequest::post().uri("/orders/auto-capture-payments?olderThanHours=0").insert_header(auth.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sweep["processed"], 1);
    assert_eq!(sweep["results"][0]["order_id"], "ord-stale");
    assert_eq!(sweep["results"][0]["result"], "captured");

    let (_, order) = ctx.send_json(TestRequest::get().uri("/orders/ord-stale")).await;
    assert_eq!(order["payment_status"], "captured");
    let (_, sweep) = ctx
        .send_json(TestRequest::post().uri("/orders/auto-capture-payments?olderThanHours=0").insert_header(auth))
        .await;
    assert_eq!(sweep["processed"], 0);
}
