use super::money::{self, Funds};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FundingType {
    /// The goal must be reached for the campaign to succeed.
    #[default]
    Fixed,
    /// The owner keeps whatever was raised.
    Flexible,
}

/// Outcome of a campaign whose funding period is over.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResultState {
    Successful,
    Completed,
}

impl ResultState {
    /// Decides success from the raw, unclamped percent.
    pub fn of(percent: Decimal, funding_type: FundingType) -> Self {
        let successful = match funding_type {
            FundingType::Flexible => percent > Decimal::ZERO,
            FundingType::Fixed => percent >= Decimal::ONE_HUNDRED,
        };
        if successful {
            Self::Successful
        } else {
            Self::Completed
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Project {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub alias: String,
    pub goal: Decimal,
    /// Only moved by transaction status transitions.
    #[serde(default)]
    pub funded: Funds,
    #[serde(default)]
    pub funding_type: FundingType,
    pub funding_start: NaiveDate,
    #[serde(default)]
    pub funding_days: u32,
    #[serde(default)]
    pub funding_end: Option<NaiveDate>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub approved: bool,
    /// Owner of the campaign and receiver of the pledges.
    pub user_id: u32,
    #[serde(default)]
    pub catid: u32,
    #[serde(default)]
    pub type_id: Option<u32>,
    #[serde(default)]
    pub location_id: Option<u32>,
}

impl Project {
    pub fn add_funds(&mut self, amount: Decimal) {
        self.funded += Funds::new(amount);
    }

    pub fn remove_funds(&mut self, amount: Decimal) {
        self.funded -= Funds::new(amount);
    }

    pub fn percent(&self) -> Decimal {
        money::percent(self.funded.value(), self.goal)
    }

    /// The last day of the campaign.
    ///
    /// A duration in days wins over an explicit end date. Without either the
    /// campaign has no deadline.
    pub fn funding_end(&self) -> Option<NaiveDate> {
        if self.funding_days > 0 {
            self.funding_start
                .checked_add_days(Days::new(u64::from(self.funding_days)))
        } else {
            self.funding_end
        }
    }

    /// Whole days remaining until the end date, never negative.
    /// `None` for campaigns without a deadline.
    pub fn days_left(&self, today: NaiveDate) -> Option<u32> {
        let end = self.funding_end()?;
        let days = (end - today).num_days().max(0);
        Some(u32::try_from(days).unwrap_or(u32::MAX))
    }

    pub fn result_state(&self) -> ResultState {
        ResultState::of(self.percent(), self.funding_type)
    }

    pub fn slug(&self) -> String {
        if self.alias.is_empty() {
            self.id.to_string()
        } else {
            format!("{}:{}", self.id, self.alias)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_project() -> Project {
        Project {
            id: 1,
            title: "Solar kiln".to_string(),
            alias: "solar-kiln".to_string(),
            goal: dec!(200),
            funded: Funds::ZERO,
            funding_type: FundingType::Fixed,
            funding_start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            funding_days: 10,
            funding_end: None,
            published: true,
            approved: true,
            user_id: 42,
            catid: 3,
            type_id: None,
            location_id: None,
        }
    }

    #[test]
    fn test_funds_movement() {
        let mut project = sample_project();
        project.add_funds(dec!(50));
        assert_eq!(project.funded, Funds::new(dec!(50)));
        assert_eq!(project.percent(), dec!(25));
        project.remove_funds(dec!(20));
        assert_eq!(project.funded, Funds::new(dec!(30)));
    }

    #[test]
    fn test_days_left() {
        let project = sample_project();
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(
            project.funding_end(),
            NaiveDate::from_ymd_opt(2024, 3, 11)
        );
        assert_eq!(project.days_left(today), Some(7));

        let late = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(project.days_left(late), Some(0));
    }

    #[test]
    fn test_no_deadline_without_days() {
        let mut project = sample_project();
        project.funding_days = 0;
        assert_eq!(project.funding_end(), None);
        assert_eq!(project.days_left(project.funding_start), None);

        project.funding_end = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(project.days_left(project.funding_start), Some(4));
    }

    #[test]
    fn test_result_state() {
        assert_eq!(
            ResultState::of(dec!(99), FundingType::Fixed),
            ResultState::Completed
        );
        assert_eq!(
            ResultState::of(dec!(150), FundingType::Fixed),
            ResultState::Successful
        );
        assert_eq!(
            ResultState::of(dec!(1), FundingType::Flexible),
            ResultState::Successful
        );
        assert_eq!(
            ResultState::of(Decimal::ZERO, FundingType::Flexible),
            ResultState::Completed
        );
    }
}
