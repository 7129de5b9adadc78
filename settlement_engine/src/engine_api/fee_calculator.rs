//! The fee calculator. Pure functions; no I/O.
use serde::{Deserialize, Serialize};

use crate::traits::FeeSchedule;
use settle_common::{Money, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub amount: Money,
    pub platform_fee: Money,
    pub processing_fee: Money,
    pub net_amount: Money,
}

/// Splits `amount` into the platform's commission, the card processing fee and what is left for the seller.
///
/// Each fee is rounded half-up to the minor unit on its own; the net amount is the exact remainder, so the three
/// parts always add back up to `amount`.
pub fn calculate_fee(amount: Money, commission: Rate, processing_rate: Rate, processing_fixed: Money) -> FeeBreakdown {
    let platform_fee = commission.apply(amount);
    let processing_fee = processing_rate.apply(amount) + processing_fixed;
    let net_amount = amount - platform_fee - processing_fee;
    FeeBreakdown { amount, platform_fee, processing_fee, net_amount }
}

/// As [`calculate_fee`], with the processing terms taken from a schedule.
pub fn calculate_with_schedule(amount: Money, commission: Rate, schedule: &FeeSchedule) -> FeeBreakdown {
    calculate_fee(amount, commission, schedule.processing_rate, schedule.processing_fixed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fifty_dollar_order() {
        let fees = calculate_fee(
            Money::from_cents(5000),
            Rate::from_percent(15),
            "2.9".parse().unwrap(),
            Money::from_cents(30),
        );
        assert_eq!(fees.platform_fee, Money::from_cents(750));
        assert_eq!(fees.processing_fee, Money::from_cents(175));
        assert_eq!(fees.net_amount, Money::from_cents(4075));
    }

    #[test]
    fn rounding_is_half_up() {
        // 12% of 0.35 is 0.042 -> 0.04; 12% of 0.38 is 0.0456 -> 0.05
        let fees = calculate_fee(Money::from_cents(35), Rate::from_percent(12), Rate::default(), Money::default());
        assert_eq!(fees.platform_fee, Money::from_cents(4));
        let fees = calculate_fee(Money::from_cents(38), Rate::from_percent(12), Rate::default(), Money::default());
        assert_eq!(fees.platform_fee, Money::from_cents(5));
        // 2.9% of 12.50 is 0.3625 -> 0.36, plus 0.30 fixed
        let fees = calculate_fee(Money::from_cents(1250), Rate::default(), Rate::from_bps(290), Money::from_cents(30));
        assert_eq!(fees.processing_fee, Money::from_cents(66));
        // exactly half a cent rounds up: 10% of 0.05 = 0.005
        let fees = calculate_fee(Money::from_cents(5), Rate::from_percent(10), Rate::default(), Money::default());
        assert_eq!(fees.platform_fee, Money::from_cents(1));
    }

    #[test]
    fn parts_add_up() {
        for cents in [1, 99, 1234, 50_000, 987_654] {
            let amount = Money::from_cents(cents);
            let fees = calculate_with_schedule(amount, Rate::from_bps(1275), &FeeSchedule::default());
            assert_eq!(fees.platform_fee + fees.processing_fee + fees.net_amount, amount);
        }
    }
}
