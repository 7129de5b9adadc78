use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderId;
use settle_common::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    /// The tokenized card or payment method supplied by the buyer's client.
    pub payment_token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub hold_ref: String,
    /// When the processor will drop the hold. If the processor does not say, the configured validity is used.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    pub capture_ref: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_ref: String,
}

/// The processor's own view of an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePaymentState {
    Authorized,
    Captured,
    Canceled,
    Unknown,
}

/// The external card processor.
///
/// Implementations must forward idempotency keys, so that a retried capture or transfer is applied only once on the
/// processor's side.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Places an authorization hold on the buyer's card for the order total.
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationResult, ProcessorError>;

    /// Captures a previously authorized hold. Returns [`ProcessorError::AlreadyCaptured`] if the processor reports
    /// the hold as already captured.
    async fn capture(
        &self,
        hold_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<CaptureResult, ProcessorError>;

    /// Voids a hold that will never be captured. Holds also lapse on their own if this is never called.
    async fn release(&self, hold_ref: &str) -> Result<(), ProcessorError>;

    /// Sends seller earnings to an external payout destination.
    async fn transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> Result<TransferResult, ProcessorError>;

    /// Retrieves the current state of an authorization.
    async fn retrieve(&self, hold_ref: &str) -> Result<RemotePaymentState, ProcessorError>;
}

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("The payment has already been captured")]
    AlreadyCaptured,
    #[error("The payment was declined: {0}")]
    Declined(String),
    #[error("Temporary processor failure: {0}")]
    Retryable(String),
    #[error("Processor failure: {0}")]
    Fatal(String),
}

impl ProcessorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
