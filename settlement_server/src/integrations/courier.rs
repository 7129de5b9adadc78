use log::*;
use reqwest::{Method, StatusCode};
use settle_common::Secret;
use settlement_engine::traits::{CourierError, CourierProvider, CourierQuote, DeliveryBooking, DeliveryRequest};

use crate::integrations::{RestClient, RestError};

/// The on-demand courier, reached over its JSON API. Deliveries are booked with the order id as the idempotency key.
#[derive(Debug, Clone)]
pub struct HttpCourier {
    client: RestClient,
}

impl HttpCourier {
    pub fn new(url: &str, api_key: &Secret<String>) -> Result<Self, RestError> {
        Ok(Self { client: RestClient::new(url, api_key)? })
    }
}

fn classify(e: RestError, delivery_id: Option<&str>) -> CourierError {
    if e.is_retryable() {
        return CourierError::Retryable(e.to_string());
    }
    match (e.status(), delivery_id) {
        (Some(StatusCode::NOT_FOUND), Some(id)) => CourierError::DeliveryNotFound(id.to_string()),
        (Some(StatusCode::UNPROCESSABLE_ENTITY), _) => CourierError::Unserviceable(e.to_string()),
        _ => CourierError::Fatal(e.to_string()),
    }
}

impl CourierProvider for HttpCourier {
    async fn quote(&self, request: &DeliveryRequest) -> Result<CourierQuote, CourierError> {
        debug!("🚚️ Requesting a courier quote for {}", request.dropoff_address);
        self.client.send(Method::POST, "/quotes", Some(request), None).await.map_err(|e| classify(e, None))
    }

    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryBooking, CourierError> {
        let key = request.order_id.as_ref().map(|id| format!("delivery-{id}"));
        debug!("🚚️ Booking a courier for order {}", key.as_deref().unwrap_or("(none)"));
        self.client
            .send(Method::POST, "/deliveries", Some(request), key.as_deref())
            .await
            .map_err(|e| classify(e, None))
    }

    async fn get_status(&self, delivery_id: &str) -> Result<DeliveryBooking, CourierError> {
        let path = format!("/deliveries/{delivery_id}");
        self.client.send(Method::GET, &path, None::<&()>, None).await.map_err(|e| classify(e, Some(delivery_id)))
    }

    async fn cancel(&self, delivery_id: &str) -> Result<(), CourierError> {
        debug!("🚚️ Cancelling courier delivery {delivery_id}");
        let path = format!("/deliveries/{delivery_id}/cancel");
        self.client
            .send_ignoring_body(Method::POST, &path, None::<&()>, None)
            .await
            .map_err(|e| classify(e, Some(delivery_id)))
    }
}
