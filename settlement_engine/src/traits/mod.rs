//! # Backend and integration contracts.
//!
//! This module defines the interfaces that storage backends and external integrations must provide for the
//! settlement engine to drive orders through their lifecycle.
//!
//! ## Storage
//! * [`OrderManagement`] persists orders and exposes the conditional updates that keep lifecycle and payment
//!   transitions single-winner under concurrency.
//! * [`WalletManagement`] is the internal ledger. Every movement is an append-only transaction row, and balances never
//!   go negative.
//! * [`RevenueManagement`] records revenue recognition exactly once per order.
//! * [`InventoryManagement`] reserves and restores stock, capacity and schedule slots.
//! * [`SettlementDatabase`] bundles the above into a single backend bound.
//!
//! ## Integrations
//! * [`PaymentProcessor`] is the card processor: authorization holds, captures and seller payouts.
//! * [`CourierProvider`] quotes and books professional deliveries.
//! * [`FeeConfigProvider`] supplies commission rates and the processing fee schedule.
mod courier_provider;
mod data_objects;
mod fee_config;
mod inventory_management;
mod order_management;
mod payment_processor;
mod revenue_management;
mod settlement_database;
mod wallet_management;

pub use courier_provider::{CourierError, CourierProvider, CourierQuote, DeliveryBooking, DeliveryRequest};
pub use data_objects::{OrderQueryFilter, RevenueRecognition};
#[cfg(test)]
pub use fee_config::MockFeeConfigProvider;
pub use fee_config::{FeeConfigProvider, FeeSchedule, StaticFeeConfig};
pub use inventory_management::{InventoryError, InventoryManagement, ReservationLine};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_processor::{
    AuthorizationRequest,
    AuthorizationResult,
    CaptureResult,
    PaymentProcessor,
    ProcessorError,
    RemotePaymentState,
    TransferResult,
};
pub use revenue_management::{RevenueError, RevenueManagement};
pub use settlement_database::SettlementDatabase;
pub use wallet_management::{WalletError, WalletManagement};
