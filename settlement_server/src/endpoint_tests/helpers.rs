use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::Duration;
use log::debug;
use serde_json::{json, Value};
use settle_common::{Money, Rate, Secret};
use settlement_engine::{
    db_types::{AccountId, FulfillmentType, LedgerEntry, NewProduct, ProductId, WalletTransactionType},
    events::EventProducers,
    test_utils::{
        doubles::{FakeCourier, FakeProcessor},
        prepare_env::fresh_database,
    },
    traits::FeeSchedule,
    EngineConfig,
    OrderFlowApi,
    SqliteDatabase,
    StaticFeeConfig,
};

use crate::{
    middleware::CourierSignature,
    server::{configure_api, ApiSettings},
};

pub const WEBHOOK_SECRET: &str = "courier-webhook-secret";
pub const SWEEP_TOKEN: &str = "sweep-token";

pub type TestApi = OrderFlowApi<SqliteDatabase, FakeProcessor, FakeCourier>;

/// A fresh engine on its own database, plus handles on the doubles it talks to.
pub struct TestContext {
    pub api: TestApi,
    pub processor: FakeProcessor,
    pub courier: FakeCourier,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = fresh_database().await;
        let processor = FakeProcessor::new();
        let courier = FakeCourier::new(Money::from_cents(1000));
        let fees = StaticFeeConfig::new(Rate::from_percent(10), FeeSchedule::default());
        let api = OrderFlowApi::new(
            db,
            processor.clone(),
            courier.clone(),
            Arc::new(fees),
            EventProducers::default(),
            EngineConfig::default(),
        );
        Self { api, processor, courier }
    }

    pub fn settings() -> ApiSettings {
        ApiSettings {
            courier_signature: CourierSignature::new(Secret::new(WEBHOOK_SECRET.to_string()), true),
            sweep_token: Secret::new(SWEEP_TOKEN.to_string()),
            auto_capture_after: Duration::hours(72),
        }
    }

    /// Runs the request against the full route table. Middleware rejections are reported like handler errors.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let settings = Self::settings();
        let app = App::new()
            .app_data(web::Data::new(self.api.clone()))
            .configure(|cfg| configure_api::<SqliteDatabase, FakeProcessor, FakeCourier>(cfg, &settings));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }

    pub async fn send_json(&self, req: TestRequest) -> (StatusCode, Value) {
        let (status, body) = self.send(req).await;
        let value = serde_json::from_str(&body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"));
        (status, value)
    }

    pub async fn stock(&self, product: &str, seller: &str, stock: i64) {
        let product = NewProduct {
            product_id: ProductId::from(product),
            seller_id: AccountId::from(seller),
            fulfillment_type: FulfillmentType::ReadyToShip,
            stock,
            available_quantity: stock,
            production_capacity: 0,
            slots: vec![],
        };
        self.api.inventory().upsert_product(product).await.expect("Could not stock product");
    }

    pub async fn top_up(&self, account: &str, cents: i64) {
        let entry = LedgerEntry::new(
            AccountId::from(account),
            Money::from_cents(cents),
            WalletTransactionType::TransferIn,
            "Top up",
        )
        .with_idempotency_key(format!("topup:{account}"));
        self.api.wallet().credit(entry).await.expect("Could not top up wallet");
    }

    pub async fn set_status(&self, order_id: &str, statuses: &[&str]) {
        for status in statuses {
            let (code, body) = self
                .send(TestRequest::put().uri(&format!("/orders/{order_id}/status")).set_json(json!({ "status": status })))
                .await;
            assert_eq!(code, StatusCode::OK, "Moving {order_id} to {status} failed: {body}");
        }
    }
}

/// A one-line checkout from `alice` to `potter` for product `vase`, collected at the studio.
pub fn pickup_checkout(order_id: &str, payment_method: &str, unit_price: i64) -> Value {
    let mut body = json!({
        "orderId": order_id,
        "buyerId": "alice",
        "items": [{
            "productId": "vase",
            "quantity": 1,
            "unitPrice": unit_price,
            "fulfillmentType": "ready_to_ship",
            "sellerId": "potter"
        }],
        "paymentMethod": payment_method,
        "deliveryMethod": "pickup"
    });
    if payment_method == "processor_card" {
        body["paymentToken"] = json!("tok_visa");
    }
    body
}
