//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST delegate to the engine. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine call is async, so await it; never block on it.
//!
//! Each handler is generic over the storage backend, the payment processor and the courier, so that the endpoint tests
//! can run the real routes against in-memory doubles.
use actix_web::{get, web, HttpResponse, Responder};
use chrono::Duration;
use log::*;
use settlement_engine::{
    db_types::{AccountId, OrderId, ProductId},
    order_objects::{CheckoutRequest, CostResponseRequest, CourierStatusUpdate, StatusUpdateRequest},
    CourierProvider,
    OrderFlowApi,
    PaymentProcessor,
    SettlementDatabase,
};

use crate::{
    data_objects::{
        CancelOrderRequest,
        ConfirmReceiptRequest,
        DeliveryQuoteRequest,
        JsonResponse,
        OrderSearchParams,
        PayoutDestinationRequest,
        ProductUpdate,
        SweepParams,
        SweepResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Operator settings the sweep endpoint needs at request time.
#[derive(Debug, Clone, Copy)]
pub struct SweepSettings {
    pub auto_capture_after: Duration,
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Route handler for checkout.
///
/// Takes a confirmed cart and turns it into a `pending` order: inventory is reserved and the buyer pays (wallet debit,
/// card authorization, or immediate capture for guests). Responds with `201 Created` and the new order. Resubmitting
/// the same `orderId` returns the stored order with `200 OK` and does not charge again.
pub async fn create_order<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout with {} items", request.items.len());
    let (order, created) = api.create_order(request).await?;
    if created {
        info!("💻️ Order {} created", order.order_id);
        Ok(HttpResponse::Created().json(order))
    } else {
        Ok(HttpResponse::Ok().json(order))
    }
}

route!(search_orders => Get "/orders" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Lists orders, filtered by `buyerId`, `sellerId`, `status` and `paymentStatus` query parameters.
pub async fn search_orders<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    query: web::Query<OrderSearchParams>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let params = query.into_inner();
    debug!("💻️ GET search orders: {params:?}");
    let orders = api.search_orders(params.into()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl SettlementDatabase, PaymentProcessor, CourierProvider);
pub async fn order_by_id<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let order = api.fetch_order(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(order_id.to_string()))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_status => Put "/orders/{order_id}/status" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Artisan or admin status change, with body `{status, reason?}`. Declines need a reason.
pub async fn update_status<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ PUT status of {order_id} to {}", request.status);
    let order = api.update_status(&order_id, request).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Put "/orders/{order_id}/cancel" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Buyer cancellation. Only allowed while the order is still `pending`.
pub async fn cancel_order<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
    body: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    let CancelOrderRequest { buyer_id, reason } = body.into_inner();
    debug!("💻️ PUT cancel {order_id} by {buyer_id}");
    let order = api.cancel_by_buyer(&order_id, &buyer_id, reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(confirm_receipt => Put "/orders/{order_id}/confirm-receipt" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// The buyer confirms a delivered or picked-up order, completing it. An outstanding card capture is attempted first.
pub async fn confirm_receipt<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
    body: web::Json<ConfirmReceiptRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    let buyer_id = body.into_inner().buyer_id;
    debug!("💻️ PUT confirm receipt of {order_id} by {buyer_id}");
    let order = api.confirm_receipt(&order_id, &buyer_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Settlement  ----------------------------------------------------
route!(capture_payment => Post "/orders/{order_id}/capture-payment" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Manual settlement trigger. Safe to call any number of times; at most one capture reaches the processor.
pub async fn capture_payment<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ POST capture payment for {order_id}");
    let outcome = api.capture_payment(&order_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// The capture sweep. Registered behind the bearer token guard, see [`crate::server::configure_api`].
///
/// Captures every authorized payment on an order that was handed over at least `MKT_AUTO_CAPTURE_HOURS` ago (or
/// `olderThanHours`, if given), and reports the outcome per order.
pub async fn auto_capture_payments<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    settings: web::Data<SweepSettings>,
    query: web::Query<SweepParams>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let older_than = query.older_than_hours.map(Duration::hours).unwrap_or(settings.auto_capture_after);
    info!("💻️ POST auto-capture sweep for orders older than {} hrs", older_than.num_hours());
    let results = api.sweep(older_than).await?;
    Ok(HttpResponse::Ok().json(SweepResponse::from(results)))
}

route!(order_revenue => Get "/orders/{order_id}/revenue" impl SettlementDatabase, PaymentProcessor, CourierProvider);
pub async fn order_revenue<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ GET revenue for {order_id}");
    let record = api
        .revenue_record(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No revenue has been recognized for {order_id}")))?;
    Ok(HttpResponse::Ok().json(record))
}

//----------------------------------------------   Delivery  ----------------------------------------------------
route!(delivery_quote => Post "/delivery-quotes" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// A live courier quote plus the buffer the buyer is charged, for display before checkout.
pub async fn delivery_quote<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    body: web::Json<DeliveryQuoteRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let request = body.into_inner();
    debug!("💻️ POST delivery quote for {} to {}", request.seller_id, request.dropoff_address);
    let quote =
        api.quote_delivery(&request.seller_id, &request.buyer_id, &request.dropoff_address, request.order_value).await?;
    Ok(HttpResponse::Ok().json(quote))
}

route!(artisan_cost_response => Post "/orders/{order_id}/artisan-cost-response" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// The artisan accepts or declines a courier cost above what the buyer paid. Body `{response: accepted|declined}`.
pub async fn artisan_cost_response<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
    body: web::Json<CostResponseRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    let response = body.into_inner().response;
    debug!("💻️ POST artisan cost response for {order_id}: {response}");
    let order = api.respond_to_delivery_cost(&order_id, response).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Courier push notifications. Registered behind the HMAC guard, see [`crate::server::configure_api`].
pub async fn delivery_webhook<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    body: web::Json<CourierStatusUpdate>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let update = body.into_inner();
    info!("💻️ Courier webhook: delivery {} is {}", update.delivery_id, update.status);
    let order = api.handle_courier_update(update).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(refresh_delivery => Post "/orders/{order_id}/refresh-delivery" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Polls the courier for the order's delivery status, or retries booking a courier if none is booked yet.
pub async fn refresh_delivery<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<OrderId>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ POST refresh delivery for {order_id}");
    let order = api.refresh_delivery(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Catalogue  ----------------------------------------------------
route!(upsert_product => Put "/products/{product_id}" impl SettlementDatabase, PaymentProcessor, CourierProvider);
pub async fn upsert_product<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<ProductId>,
    body: web::Json<ProductUpdate>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let product_id = path.into_inner();
    debug!("💻️ PUT product {product_id}");
    let product = api.inventory().upsert_product(body.into_inner().into_new_product(product_id)).await?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(wallet_statement => Get "/wallets/{account_id}" impl SettlementDatabase, PaymentProcessor, CourierProvider);
/// Balance and transaction log for an account. Accounts that never transacted have a zero balance.
pub async fn wallet_statement<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<AccountId>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let account_id = path.into_inner();
    debug!("💻️ GET wallet statement for {account_id}");
    let statement = api.wallet().statement(&account_id).await?;
    Ok(HttpResponse::Ok().json(statement))
}

route!(payout_destination => Put "/sellers/{account_id}/payout-destination" impl SettlementDatabase, PaymentProcessor, CourierProvider);
pub async fn payout_destination<B, P, C>(
    api: web::Data<OrderFlowApi<B, P, C>>,
    path: web::Path<AccountId>,
    body: web::Json<PayoutDestinationRequest>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    P: PaymentProcessor,
    C: CourierProvider,
{
    let account_id = path.into_inner();
    let destination = body.into_inner().destination;
    if destination.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("The payout destination cannot be empty".into()));
    }
    debug!("💻️ PUT payout destination for {account_id}");
    api.wallet().set_payout_destination(&account_id, destination.trim()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Payout destination for {account_id} updated"))))
}
