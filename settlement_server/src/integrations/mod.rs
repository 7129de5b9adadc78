//! HTTP clients for the services the engine depends on: the card processor, the courier and the notification
//! webhook.
//!
//! Every client speaks JSON over a shared [`RestClient`], which maps transport and status failures into
//! [`RestError`]. Each integration then classifies those into the engine's own error kinds.
mod courier;
mod notifications;
mod processor;

use std::sync::Arc;

pub use courier::HttpCourier;
pub use notifications::notification_hooks;
pub use processor::HttpProcessor;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use settle_common::Secret;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RestError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request failed before a response was received: {0}")]
    Transport(String),
    #[error("Could not deserialize JSON: {0}")]
    Json(String),
    #[error("Request failed. Error {status}. {message}")]
    Status { status: u16, message: String },
}

impl RestError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }

    /// Network failures, rate limiting and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A JSON client bound to one base URL and API key.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RestClient({})", self.base_url)
    }
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &Secret<String>) -> Result<Self, RestError> {
        let mut headers = HeaderMap::with_capacity(2);
        if !api_key.is_empty() {
            let val = HeaderValue::from_str(&format!("Bearer {}", api_key.reveal()))
                .map_err(|e| RestError::Initialization(e.to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| RestError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a request and parses the JSON response. `idempotency_key` is forwarded in the `Idempotency-Key` header.
    pub async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        idempotency_key: Option<&str>,
    ) -> Result<T, RestError> {
        let url = self.url(path);
        trace!("Sending {method} request to {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| RestError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("Request successful. {status}");
            response.json::<T>().await.map_err(|e| RestError::Json(e.to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RestError::Status { status: status.as_u16(), message })
        }
    }

    /// Like [`RestClient::send`], for endpoints whose response body is irrelevant.
    pub async fn send_ignoring_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        idempotency_key: Option<&str>,
    ) -> Result<(), RestError> {
        let url = self.url(path);
        trace!("Sending {method} request to {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| RestError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RestError::Status { status: status.as_u16(), message })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_failures() {
        assert!(RestError::Transport("connection reset".into()).is_retryable());
        assert!(RestError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(RestError::Status { status: 429, message: String::new() }.is_retryable());
        assert!(!RestError::Status { status: 402, message: String::new() }.is_retryable());
        assert!(!RestError::Json("eof".into()).is_retryable());
    }

    #[test]
    fn urls_ignore_trailing_slashes() {
        let client = RestClient::new("https://processor.example/v1/", &Secret::default()).unwrap();
        assert_eq!(client.url("/transfers"), "https://processor.example/v1/transfers");
    }
}
