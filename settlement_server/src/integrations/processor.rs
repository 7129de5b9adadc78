use log::*;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use settle_common::{Money, Secret};
use settlement_engine::traits::{
    AuthorizationRequest,
    AuthorizationResult,
    CaptureResult,
    PaymentProcessor,
    ProcessorError,
    RemotePaymentState,
    TransferResult,
};

use crate::integrations::{RestClient, RestError};

/// The card processor, reached over its JSON API.
///
/// | Call        | Request                                 |
/// |-------------|-----------------------------------------|
/// | `authorize` | `POST /authorizations`                  |
/// | `capture`   | `POST /authorizations/{hold}/capture`   |
/// | `release`   | `POST /authorizations/{hold}/release`   |
/// | `transfer`  | `POST /transfers`                       |
/// | `retrieve`  | `GET /authorizations/{hold}`            |
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: RestClient,
}

#[derive(Serialize)]
struct CaptureBody {
    amount: Money,
}

#[derive(Serialize)]
struct TransferBody<'a> {
    amount: Money,
    destination: &'a str,
}

#[derive(Deserialize)]
struct AuthorizationStatus {
    status: RemotePaymentState,
}

impl HttpProcessor {
    pub fn new(url: &str, api_key: &Secret<String>) -> Result<Self, RestError> {
        Ok(Self { client: RestClient::new(url, api_key)? })
    }
}

fn classify(e: RestError) -> ProcessorError {
    if e.is_retryable() {
        return ProcessorError::Retryable(e.to_string());
    }
    match e.status() {
        Some(StatusCode::PAYMENT_REQUIRED) => ProcessorError::Declined(e.to_string()),
        _ => ProcessorError::Fatal(e.to_string()),
    }
}

impl PaymentProcessor for HttpProcessor {
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationResult, ProcessorError> {
        debug!("💳️ Requesting a {} hold for order {}", request.amount, request.order_id);
        let key = request.idempotency_key.clone();
        self.client.send(Method::POST, "/authorizations", Some(&request), Some(&key)).await.map_err(classify)
    }

    async fn capture(
        &self,
        hold_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<CaptureResult, ProcessorError> {
        debug!("💳️ Capturing {amount} on hold {hold_ref}");
        let path = format!("/authorizations/{hold_ref}/capture");
        let body = CaptureBody { amount };
        self.client.send(Method::POST, &path, Some(&body), Some(idempotency_key)).await.map_err(|e| {
            match e.status() {
                Some(StatusCode::CONFLICT) => ProcessorError::AlreadyCaptured,
                _ => classify(e),
            }
        })
    }

    async fn release(&self, hold_ref: &str) -> Result<(), ProcessorError> {
        debug!("💳️ Releasing hold {hold_ref}");
        let path = format!("/authorizations/{hold_ref}/release");
        self.client.send_ignoring_body(Method::POST, &path, None::<&()>, None).await.map_err(classify)
    }

    async fn transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> Result<TransferResult, ProcessorError> {
        debug!("💳️ Transferring {amount} to {destination}");
        let body = TransferBody { amount, destination };
        self.client.send(Method::POST, "/transfers", Some(&body), Some(idempotency_key)).await.map_err(classify)
    }

    async fn retrieve(&self, hold_ref: &str) -> Result<RemotePaymentState, ProcessorError> {
        let path = format!("/authorizations/{hold_ref}");
        let status: AuthorizationStatus =
            self.client.send(Method::GET, &path, None::<&()>, None).await.map_err(classify)?;
        Ok(status.status)
    }
}
