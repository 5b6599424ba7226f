use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Gateway-reported state of a pledge.
///
/// Gateways are free to report statuses this crate does not know about; those
/// are kept verbatim in `Other` and behave like every other non-completed state.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Canceled,
    Refunded,
    Failed,
    Other(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Other(status) => status,
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == Self::Completed
    }
}

impl From<&str> for TransactionStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "canceled" | "cancelled" => Self::Canceled,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a status change does to the project's funded total.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FundsEffect {
    Add,
    Remove,
    None,
}

impl FundsEffect {
    /// Only moves into and out of `completed` touch the funded total.
    pub fn of(old: &TransactionStatus, new: &TransactionStatus) -> Self {
        match (old.is_completed(), new.is_completed()) {
            (true, false) => Self::Remove,
            (false, true) => Self::Add,
            _ => Self::None,
        }
    }

    pub fn delta(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Add => amount,
            Self::Remove => -amount,
            Self::None => Decimal::ZERO,
        }
    }
}

/// Gateway payload snapshots keyed by unix timestamp.
pub type ExtraData = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum RewardState {
    #[default]
    NotSent,
    Sent,
}

/// A pledge recorded from a payment gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: u32,
    pub txn_date: DateTime<Utc>,
    /// Identifier assigned by the gateway.
    pub txn_id: String,
    #[serde(default)]
    pub parent_txn_id: Option<String>,
    pub txn_amount: Decimal,
    pub txn_currency: String,
    pub txn_status: TransactionStatus,
    #[serde(default)]
    pub status_reason: String,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub extra_data: ExtraData,
    pub project_id: u32,
    #[serde(default)]
    pub reward_id: Option<u32>,
    /// Backer, 0 for anonymous pledges.
    #[serde(default)]
    pub investor_id: u32,
    pub receiver_id: u32,
    pub service_provider: String,
    pub service_alias: String,
    #[serde(default)]
    pub reward_state: RewardState,
}
