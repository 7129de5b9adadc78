use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settle_common::Secret;
use settlement_engine::{
    events::EventHandlers,
    CourierProvider,
    OrderFlowApi,
    PaymentProcessor,
    SettlementDatabase,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{notification_hooks, HttpCourier, HttpProcessor},
    middleware::{BearerTokenMiddlewareFactory, CourierSignature, CourierSignatureGuard},
    routes::{
        auto_capture_payments,
        delivery_webhook,
        health,
        ArtisanCostResponseRoute,
        CancelOrderRoute,
        CapturePaymentRoute,
        ConfirmReceiptRoute,
        CreateOrderRoute,
        DeliveryQuoteRoute,
        OrderByIdRoute,
        OrderRevenueRoute,
        PayoutDestinationRoute,
        RefreshDeliveryRoute,
        SearchOrdersRoute,
        SweepSettings,
        UpdateStatusRoute,
        UpsertProductRoute,
        WalletStatementRoute,
    },
    sweep_worker::start_sweep_worker,
};

/// The production API: SQLite storage with the HTTP processor and courier.
pub type MarketplaceApi = OrderFlowApi<SqliteDatabase, HttpProcessor, HttpCourier>;

/// The subset of the configuration the routes need: request guards and sweep defaults. Secrets stay wrapped.
#[derive(Clone, Debug)]
pub struct ApiSettings {
    pub courier_signature: CourierSignature,
    pub sweep_token: Secret<String>,
    pub auto_capture_after: chrono::Duration,
}

impl ApiSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            courier_signature: config.courier.signature(),
            sweep_token: config.sweep_token.clone(),
            auto_capture_after: config.auto_capture_after,
        }
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let processor = HttpProcessor::new(&config.processor.url, &config.processor.api_key)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let courier = HttpCourier::new(&config.courier.url, &config.courier.api_key)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(128, notification_hooks(config.notification_url.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let fees = Arc::new(config.fees.fee_config());
    let api = OrderFlowApi::new(db, processor, courier, fees, producers, config.engine_config());
    match config.sweep_interval {
        Some(interval) => {
            let _worker = start_sweep_worker(api.clone(), interval, config.auto_capture_after);
        },
        None => info!("🕰️ The in-process capture sweep is disabled"),
    }
    let srv = create_server_instance(config, api)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, api: MarketplaceApi) -> Result<Server, ServerError> {
    let settings = ApiSettings::from_config(&config);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(api.clone()))
            .configure(|cfg| configure_api::<SqliteDatabase, HttpProcessor, HttpCourier>(cfg, &settings))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route. The caller supplies the `OrderFlowApi<B, P, C>` as app data.
///
/// Fixed paths are registered before the `/orders/{order_id}` family so that they are never read as order ids.
pub fn configure_api<B, P, C>(cfg: &mut web::ServiceConfig, settings: &ApiSettings)
where
    B: SettlementDatabase + 'static,
    P: PaymentProcessor + 'static,
    C: CourierProvider + 'static,
{
    cfg.app_data(web::Data::new(SweepSettings { auto_capture_after: settings.auto_capture_after }))
        .service(health)
        .service(
            web::resource("/orders/auto-capture-payments")
                .name("auto_capture_payments")
                .wrap(BearerTokenMiddlewareFactory::new(settings.sweep_token.clone()))
                .route(web::post().to(auto_capture_payments::<B, P, C>)),
        )
        .service(
            web::resource("/orders/delivery-webhook")
                .name("delivery_webhook")
                .wrap(CourierSignatureGuard::new(settings.courier_signature.clone()))
                .route(web::post().to(delivery_webhook::<B, P, C>)),
        )
        .service(CreateOrderRoute::<B, P, C>::new())
        .service(SearchOrdersRoute::<B, P, C>::new())
        .service(OrderByIdRoute::<B, P, C>::new())
        .service(UpdateStatusRoute::<B, P, C>::new())
        .service(CancelOrderRoute::<B, P, C>::new())
        .service(ConfirmReceiptRoute::<B, P, C>::new())
        .service(CapturePaymentRoute::<B, P, C>::new())
        .service(OrderRevenueRoute::<B, P, C>::new())
        .service(ArtisanCostResponseRoute::<B, P, C>::new())
        .service(RefreshDeliveryRoute::<B, P, C>::new())
        .service(DeliveryQuoteRoute::<B, P, C>::new())
        .service(UpsertProductRoute::<B, P, C>::new())
        .service(WalletStatementRoute::<B, P, C>::new())
        .service(PayoutDestinationRoute::<B, P, C>::new());
}
