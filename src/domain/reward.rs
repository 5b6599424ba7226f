use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How many units of a reward can still be claimed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Availability {
    Unlimited,
    Limited(u32),
}

impl Availability {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Limited(0))
    }
}

/// A perk tier of a project.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Reward {
    pub id: u32,
    pub project_id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Minimum pledge that qualifies for the reward.
    pub amount: Decimal,
    /// Supply cap, 0 means unlimited.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub distributed: u32,
    #[serde(default)]
    pub delivery: Option<NaiveDate>,
    #[serde(default)]
    pub shipping: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub ordering: u32,
}

impl Reward {
    pub fn is_limited(&self) -> bool {
        self.number > 0
    }

    pub fn available(&self) -> Availability {
        if self.is_limited() {
            Availability::Limited(self.number.saturating_sub(self.distributed))
        } else {
            Availability::Unlimited
        }
    }

    pub fn increase_distributed(&mut self) {
        self.distributed += 1;
    }
}
