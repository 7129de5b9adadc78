use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db_types::AccountId;
use settle_common::{Money, Rate};

/// The card processing fee: a percentage plus a fixed amount per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub processing_rate: Rate,
    pub processing_fixed: Money,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { processing_rate: Rate::from_bps(290), processing_fixed: Money::from_cents(30) }
    }
}

impl FeeSchedule {
    /// A schedule that charges nothing. Used for orders that never touch the card processor.
    pub fn zero() -> Self {
        Self { processing_rate: Rate::default(), processing_fixed: Money::default() }
    }
}

/// Supplies commission rates and the processing fee schedule.
#[cfg_attr(test, mockall::automock)]
pub trait FeeConfigProvider: Send + Sync {
    /// The seller's current commission rate.
    fn commission_rate(&self, seller_id: &AccountId) -> Rate;

    fn fee_schedule(&self) -> FeeSchedule;
}

/// Fee configuration loaded once at start-up: a default commission rate, per-seller overrides and a single processing
/// fee schedule.
#[derive(Debug, Clone)]
pub struct StaticFeeConfig {
    default_commission: Rate,
    overrides: HashMap<AccountId, Rate>,
    schedule: FeeSchedule,
}

impl Default for StaticFeeConfig {
    fn default() -> Self {
        Self::new(Rate::from_percent(12), FeeSchedule::default())
    }
}

impl StaticFeeConfig {
    pub fn new(default_commission: Rate, schedule: FeeSchedule) -> Self {
        Self { default_commission, overrides: HashMap::new(), schedule }
    }

    pub fn with_override(mut self, seller_id: AccountId, rate: Rate) -> Self {
        self.overrides.insert(seller_id, rate);
        self
    }
}

impl FeeConfigProvider for StaticFeeConfig {
    fn commission_rate(&self, seller_id: &AccountId) -> Rate {
        self.overrides.get(seller_id).copied().unwrap_or(self.default_commission)
    }

    fn fee_schedule(&self) -> FeeSchedule {
        self.schedule
    }
}
