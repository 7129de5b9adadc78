use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::{ExternalErrorKind, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientFunds(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("An upstream service failed. {0}")]
    ExternalServiceError(String),
    #[error("Missing or invalid access token")]
    Unauthorized,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientFunds(_) => StatusCode::PAYMENT_REQUIRED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::Validation(_) => Self::InvalidRequestBody(e.to_string()),
            SettlementError::InsufficientFunds { .. } => Self::InsufficientFunds(e.to_string()),
            SettlementError::InvalidTransition { .. } => Self::InvalidTransition(e.to_string()),
            SettlementError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            SettlementError::ExternalService { kind: ExternalErrorKind::AlreadyDone, .. } => {
                Self::InvalidTransition(e.to_string())
            },
            SettlementError::ExternalService { .. } => Self::ExternalServiceError(e.to_string()),
            SettlementError::InconsistentState(_) | SettlementError::Database(_) => Self::BackendError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use settlement_engine::db_types::{AccountId, OrderId, OrderStatus};
    use settle_common::Money;

    use super::*;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases: Vec<(SettlementError, StatusCode)> = vec![
            (SettlementError::Validation("no items".into()), StatusCode::BAD_REQUEST),
            (
                SettlementError::InsufficientFunds {
                    account: AccountId::from("bob"),
                    balance: Money::from_cents(100),
                    requested: Money::from_cents(500),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                SettlementError::invalid_transition(
                    &OrderId::from("o1"),
                    OrderStatus::Completed,
                    OrderStatus::Cancelled,
                    "",
                ),
                StatusCode::CONFLICT,
            ),
            (SettlementError::OrderNotFound(OrderId::from("o1")), StatusCode::NOT_FOUND),
            (
                SettlementError::ExternalService {
                    service: "courier",
                    kind: ExternalErrorKind::Retryable,
                    message: "timeout".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (SettlementError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let server_error = ServerError::from(error);
            assert_eq!(server_error.status_code(), expected, "{server_error}");
        }
    }
}
