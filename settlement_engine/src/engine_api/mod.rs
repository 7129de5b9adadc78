//! # Settlement engine public API
//!
//! The `engine_api` module exposes the programmatic API of the settlement engine. Each component is its own API
//! object, generic over the backend traits it needs, so that callers can pick the parts they want and swap in test
//! doubles for the external collaborators.
//!
//! * [`fee_calculator`] splits an amount into commission, processing fee and seller net. Pure functions.
//! * [`inventory_api`] reserves and restores stock, production capacity and schedule slots.
//! * [`wallet_api`] is the internal ledger: credits, debits and compensated transfers.
//! * [`settlement_api`] owns authorize → capture → recognize → payout, and refunds. Every step is idempotent per
//!   order.
//! * [`delivery_api`] negotiates professional delivery costs with the courier and the artisan.
//! * [`order_flow_api`] is the lifecycle state machine that sequences all of the above.
//!
//! # API usage
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url(url, 5).await?;
//! let fees = Arc::new(StaticFeeConfig::default());
//! let api = OrderFlowApi::new(db, processor, courier, fees, producers, EngineConfig::default());
//! let (order, _) = api.create_order(checkout_request).await?;
//! ```
pub mod delivery_api;
pub mod errors;
pub mod fee_calculator;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod settlement_api;
pub mod wallet_api;
