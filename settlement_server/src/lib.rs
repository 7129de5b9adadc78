//! # Marketplace settlement server
//! This crate hosts the HTTP surface of the settlement engine. It is responsible for:
//! * Accepting checkouts, status updates, buyer cancellations and confirmations.
//! * Receiving courier webhooks and artisan delivery-cost decisions.
//! * Exposing the manual capture trigger and the bearer-token-gated capture sweep, and running the sweep on a timer.
//! * Talking to the card processor, the courier and the notification webhook over HTTP.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /orders`, `GET /orders`, `GET /orders/{id}`: checkout and order queries.
//! * `PUT /orders/{id}/status`, `PUT /orders/{id}/cancel`, `PUT /orders/{id}/confirm-receipt`: lifecycle triggers.
//! * `POST /orders/{id}/capture-payment`, `POST /orders/auto-capture-payments`, `GET /orders/{id}/revenue`:
//!   settlement.
//! * `POST /delivery-quotes`, `POST /orders/{id}/artisan-cost-response`, `POST /orders/delivery-webhook`,
//!   `POST /orders/{id}/refresh-delivery`: professional delivery.
//! * `PUT /products/{id}`, `GET /wallets/{id}`, `PUT /sellers/{id}/payout-destination`: catalogue and wallets.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
