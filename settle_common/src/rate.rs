use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::Money;

const BPS_PER_UNIT: i64 = 10_000;

//--------------------------------------        Rate         ---------------------------------------------------------
/// A percentage in basis points (1% == 100 bps). Commission and processing rates are stored this way so that fee
/// arithmetic stays in integers.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Rate(i64);

impl Rate {
    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: i64) -> Self {
        Self(percent * 100)
    }

    pub fn bps(&self) -> i64 {
        self.0
    }

    /// `amount * rate`, rounded half away from zero to the nearest minor unit.
    pub fn apply(&self, amount: Money) -> Money {
        let n = i128::from(amount.value()) * i128::from(self.0);
        let d = i128::from(BPS_PER_UNIT);
        let mut q = n / d;
        let r = n % d;
        if r.abs() * 2 >= d {
            q += n.signum();
        }
        #[allow(clippy::cast_possible_truncation)]
        Money::from(q as i64)
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Not a valid percentage: {0}")]
pub struct RateParseError(String);

/// Parses a percentage such as `15`, `2.9` or `12.75` (at most two decimals, between 0 and 100 inclusive).
impl FromStr for Rate {
    type Err = RateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%');
        let invalid = || RateParseError(s.to_string());
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole = whole.parse::<i64>().map_err(|_| invalid())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let bps = whole * 100 + frac;
        if bps > BPS_PER_UNIT {
            return Err(invalid());
        }
        Ok(Self(bps))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_percentages() {
        assert_eq!("15".parse::<Rate>().unwrap(), Rate::from_bps(1500));
        assert_eq!("2.9".parse::<Rate>().unwrap(), Rate::from_bps(290));
        assert_eq!("12.75%".parse::<Rate>().unwrap(), Rate::from_bps(1275));
        assert!("101".parse::<Rate>().is_err());
        assert!("-1".parse::<Rate>().is_err());
        assert!("2.905".parse::<Rate>().is_err());
    }

    #[test]
    fn apply_rounds_half_up() {
        let fifteen = Rate::from_percent(15);
        assert_eq!(fifteen.apply(Money::from(5000)), Money::from(750));
        let card = Rate::from_bps(290);
        assert_eq!(card.apply(Money::from(5000)), Money::from(145));
        // 1.0 * 2.5% = 0.025 -> 0.03
        assert_eq!(Rate::from_bps(250).apply(Money::from(100)), Money::from(3));
        // 0.99 * 2.9% = 0.02871 -> 0.03
        assert_eq!(card.apply(Money::from(99)), Money::from(3));
        // 0.10 * 2.9% = 0.0029 -> 0.00
        assert_eq!(card.apply(Money::from(10)), Money::from(0));
        assert_eq!(Rate::from_bps(250).apply(Money::from(-100)), Money::from(-3));
    }

    #[test]
    fn display() {
        assert_eq!(Rate::from_bps(290).to_string(), "2.90%");
        assert_eq!(Rate::from_percent(15).to_string(), "15.00%");
    }
}
