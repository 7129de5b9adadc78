use thiserror::Error;

use crate::{
    db_types::{AccountId, OrderId, OrderStatus},
    traits::{CourierError, InventoryError, OrderStoreError, ProcessorError, RevenueError, WalletError},
};
use settle_common::Money;

/// How an external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalErrorKind {
    /// The operation had already been applied. Callers treat this as success.
    AlreadyDone,
    /// Worth trying the same operation again later.
    Retryable,
    Fatal,
}

/// The error type of the settlement engine API.
#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Insufficient funds in wallet {account}: balance {balance}, requested {requested}")]
    InsufficientFunds { account: AccountId, balance: Money, requested: Money },
    #[error("Order {order_id} cannot move from {from} to {to}. {detail}")]
    InvalidTransition { order_id: OrderId, from: OrderStatus, to: OrderStatus, detail: String },
    #[error("{service} error ({kind:?}): {message}")]
    ExternalService { service: &'static str, kind: ExternalErrorKind, message: String },
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Database error: {0}")]
    Database(String),
}

impl SettlementError {
    pub fn invalid_transition<S: Into<String>>(order_id: &OrderId, from: OrderStatus, to: OrderStatus, detail: S) -> Self {
        Self::InvalidTransition { order_id: order_id.clone(), from, to, detail: detail.into() }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { kind: ExternalErrorKind::Retryable, .. } | Self::Database(_))
    }
}

impl From<OrderStoreError> for SettlementError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::InvalidData(s) => Self::Validation(s),
            OrderStoreError::DatabaseError(s) => Self::Database(s),
        }
    }
}

impl From<WalletError> for SettlementError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientFunds { account, balance, requested } => {
                Self::InsufficientFunds { account, balance, requested }
            },
            WalletError::InvalidAmount(m) => Self::Validation(format!("Ledger amounts must be positive. Got {m}")),
            WalletError::DatabaseError(s) => Self::Database(s),
        }
    }
}

impl From<RevenueError> for SettlementError {
    fn from(e: RevenueError) -> Self {
        match e {
            RevenueError::InvalidRecord(s) => Self::InconsistentState(s),
            RevenueError::DatabaseError(s) => Self::Database(s),
        }
    }
}

impl From<InventoryError> for SettlementError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::DatabaseError(s) => Self::Database(s),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ProcessorError> for SettlementError {
    fn from(e: ProcessorError) -> Self {
        let kind = match &e {
            ProcessorError::AlreadyCaptured => ExternalErrorKind::AlreadyDone,
            ProcessorError::Retryable(_) => ExternalErrorKind::Retryable,
            ProcessorError::Declined(_) | ProcessorError::Fatal(_) => ExternalErrorKind::Fatal,
        };
        Self::ExternalService { service: "payment processor", kind, message: e.to_string() }
    }
}

impl From<CourierError> for SettlementError {
    fn from(e: CourierError) -> Self {
        let kind = match &e {
            CourierError::Retryable(_) => ExternalErrorKind::Retryable,
            _ => ExternalErrorKind::Fatal,
        };
        Self::ExternalService { service: "courier", kind, message: e.to_string() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn processor_errors_are_classified() {
        let e: SettlementError = ProcessorError::AlreadyCaptured.into();
        assert!(matches!(e, SettlementError::ExternalService { kind: ExternalErrorKind::AlreadyDone, .. }));
        let e: SettlementError = ProcessorError::Retryable("timeout".into()).into();
        assert!(e.is_retryable());
        let e: SettlementError = ProcessorError::Declined("card expired".into()).into();
        assert!(!e.is_retryable());
    }

    #[test]
    fn wallet_shortfall_keeps_its_details() {
        let e: SettlementError = WalletError::InsufficientFunds {
            account: AccountId::from("buyer"),
            balance: Money::from_cents(100),
            requested: Money::from_cents(250),
        }
        .into();
        assert_eq!(e.to_string(), "Insufficient funds in wallet buyer: balance 1.00, requested 2.50");
    }
}
