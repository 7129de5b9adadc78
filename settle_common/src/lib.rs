//! Shared primitives for the marketplace settlement engine.
//!
//! * [`Money`] is an amount in the deployment currency, counted in minor units (cents).
//! * [`Rate`] is a percentage expressed in basis points, used for commission and processing fees.
//! * [`Secret`] wraps configuration values that must never end up in a log line.
mod money;
mod rate;
mod secret;

pub mod helpers;
pub mod op;

pub use money::{Money, MoneyParseError, DEFAULT_CURRENCY_CODE};
pub use rate::{Rate, RateParseError};
pub use secret::Secret;
