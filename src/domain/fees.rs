use super::money::value_from_percent;
use super::project::FundingType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Platform fees charged per funding type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct FeeSchedule {
    pub fixed_campaign_percent: Decimal,
    pub fixed_campaign_amount: Decimal,
    pub flexible_campaign_percent: Decimal,
    pub flexible_campaign_amount: Decimal,
}

impl FeeSchedule {
    /// Fee taken from a pledge of `txn_amount`.
    ///
    /// Each component only applies when the pledge is larger than it, and the
    /// result is never negative.
    pub fn calculate(&self, funding_type: FundingType, txn_amount: Decimal) -> Decimal {
        let (fee_percent, fee_amount) = match funding_type {
            FundingType::Fixed => (self.fixed_campaign_percent, self.fixed_campaign_amount),
            FundingType::Flexible => (
                self.flexible_campaign_percent,
                self.flexible_campaign_amount,
            ),
        };

        let mut result = Decimal::ZERO;

        if fee_percent > Decimal::ZERO {
            let percent_amount = value_from_percent(fee_percent, txn_amount);
            if txn_amount > percent_amount {
                result += percent_amount;
            }
        }

        if fee_amount > Decimal::ZERO && txn_amount > fee_amount {
            result += fee_amount;
        }

        result.max(Decimal::ZERO)
    }
}
