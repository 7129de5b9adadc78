use std::sync::Arc;

use cucumber::World;
use log::*;
use settle_common::Money;
use settlement_engine::{
    db_types::{AccountId, DeliveryMethod, FulfillmentType, Order, OrderId, PaymentMethod, ProductId},
    events::EventProducers,
    order_objects::{CheckoutItem, CheckoutRequest, DeliveryQuoteInput},
    test_utils::{
        doubles::{FakeCourier, FakeProcessor},
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    EngineConfig,
    OrderFlowApi,
    SettlementError,
    SqliteDatabase,
    StaticFeeConfig,
};

pub type MarketplaceApi = OrderFlowApi<SqliteDatabase, FakeProcessor, FakeCourier>;

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<MarketplaceSystem>,
    pub last_error: Option<SettlementError>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: MarketplaceApi,
    pub processor: FakeProcessor,
    pub courier: FakeCourier,
}

impl SettlementWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn api(&self) -> &MarketplaceApi {
        &self.system().api
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.api()
            .fetch_order(&OrderId::from(order_id))
            .await
            .expect("Error fetching order")
            .unwrap_or_else(|| panic!("Order {order_id} does not exist"))
    }

    /// Keeps the outcome of an operation that the scenario expects may fail.
    pub fn record<T>(&mut self, result: Result<T, SettlementError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed with: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl MarketplaceSystem {
    pub async fn new(fees: StaticFeeConfig) -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 4).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        let processor = FakeProcessor::new();
        let courier = FakeCourier::default();
        let api = OrderFlowApi::new(
            db.clone(),
            processor.clone(),
            courier.clone(),
            Arc::new(fees),
            EventProducers::default(),
            EngineConfig::default(),
        );
        Self { db_path: url, db, api, processor, courier }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}

pub fn money(s: &str) -> Money {
    s.parse().unwrap_or_else(|e| panic!("{s} is not an amount: {e}"))
}

/// A single-item cart.
pub fn checkout(
    order_id: &str,
    buyer: Option<&str>,
    product: &str,
    quantity: i64,
    unit_price: Money,
    method: PaymentMethod,
) -> CheckoutRequest {
    CheckoutRequest {
        order_id: Some(OrderId::from(order_id)),
        buyer_id: buyer.map(AccountId::from),
        is_guest: buyer.is_none(),
        seller_id: None,
        items: vec![CheckoutItem {
            product_id: ProductId::from(product),
            quantity,
            unit_price,
            fulfillment_type: FulfillmentType::ReadyToShip,
            seller_id: Some(AccountId::from("potter")),
            schedule_slot: None,
        }],
        payment_method: method,
        payment_token: match method {
            PaymentMethod::ProcessorCard => Some("tok_visa".into()),
            PaymentMethod::InternalWallet => None,
        },
        hold_ref: None,
        delivery_method: DeliveryMethod::Pickup,
        delivery_address: None,
        delivery_fee: Money::default(),
        delivery_pricing: None,
        subtotal: None,
        total_amount: None,
    }
}

pub fn with_courier(mut request: CheckoutRequest, estimate: Money, charged: Money) -> CheckoutRequest {
    request.delivery_method = DeliveryMethod::ProfessionalDelivery;
    request.delivery_address = Some("12 Harbour Road".into());
    request.delivery_fee = charged;
    request.delivery_pricing =
        Some(DeliveryQuoteInput { estimated_fee: estimate, courier_quote_id: None, courier_quote_expiry: None });
    request
}
