//! Marketplace Settlement Engine
//!
//! The settlement engine takes a marketplace order from checkout to its final state: it holds or collects the buyer's
//! payment, reserves inventory, drives the order through its lifecycle, captures card payments, credits the seller's
//! wallet exactly once and pays earnings out. It is transport-agnostic; the HTTP surface lives in
//! `settlement_server`.
//!
//! The library is divided into these sections:
//! 1. Data types ([`mod@db_types`]) shared by every layer.
//! 2. Backend and integration contracts ([`mod@traits`]). Storage backends implement the management traits; the card
//!    processor and the courier are reached through [`PaymentProcessor`] and [`CourierProvider`].
//! 3. The SQLite backend, [`SqliteDatabase`].
//! 4. The public API ([`mod@engine_api`]), with [`OrderFlowApi`] as the entry point for every order trigger.
//!
//! The engine also publishes events when orders change status, when revenue is recognized, and for every
//! participant notification. A simple actor framework ([`mod@events`]) lets you hook into these.
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    delivery_api::{DeliveryApi, DeliveryQuote, NegotiationOutcome},
    errors::{ExternalErrorKind, SettlementError},
    fee_calculator::{calculate_fee, calculate_with_schedule, FeeBreakdown},
    inventory_api::InventoryApi,
    order_flow_api::{EngineConfig, OrderFlowApi},
    order_objects,
    settlement_api::{
        CaptureOutcome,
        PayoutOutcome,
        RefundOutcome,
        RevenueOutcome,
        SettlementApi,
        SettlementConfig,
        SweepEntry,
        SweepResult,
    },
    wallet_api::{WalletApi, WalletStatement},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    CourierProvider,
    FeeConfigProvider,
    FeeSchedule,
    InventoryManagement,
    OrderManagement,
    PaymentProcessor,
    RevenueManagement,
    SettlementDatabase,
    StaticFeeConfig,
    WalletManagement,
};
