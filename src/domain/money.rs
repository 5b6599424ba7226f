use crate::error::CrowdfundingError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::Signed;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Running total of money raised by a project.
///
/// Wraps `rust_decimal::Decimal` so that funded totals cannot be mixed up with
/// goals or pledge amounts by accident.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Funds(pub Decimal);

/// A strictly positive amount pledged by a backer.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct PledgeAmount(Decimal);

impl PledgeAmount {
    pub fn new(value: Decimal) -> Result<Self, CrowdfundingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CrowdfundingError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for PledgeAmount {
    type Error = CrowdfundingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PledgeAmount> for Decimal {
    fn from(amount: PledgeAmount) -> Self {
        amount.0
    }
}

impl From<PledgeAmount> for Funds {
    fn from(amount: PledgeAmount) -> Self {
        Self(amount.0)
    }
}

impl Funds {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add for Funds {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Funds {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Funds {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl AddAssign for Funds {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Funds {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Percentage of the goal raised so far, rounded to a whole number.
///
/// The value is not clamped: a project that raised twice its goal reports 200.
/// A zero (or negative) goal yields 0.
pub fn percent(funded: Decimal, goal: Decimal) -> Decimal {
    if goal <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    funded
        .checked_div(goal)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| saturated(funded))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// The largest value with the sign of `value`.
fn saturated(value: Decimal) -> Decimal {
    if value.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }
}

/// Width of a progress bar in percent, clamped to `0..=100`.
pub fn progress_width(percent: Decimal) -> Decimal {
    percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// `percent` of `value`, used by the fee schedule.
pub fn value_from_percent(percent: Decimal, value: Decimal) -> Decimal {
    value
        .checked_mul(percent)
        .map(|v| v / Decimal::ONE_HUNDRED)
        .unwrap_or_else(|| saturated(value * percent.signum()))
}
