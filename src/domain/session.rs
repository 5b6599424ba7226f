use crate::error::{CrowdfundingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wizard progress kept in the user's session while they back a project.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct PaymentProcess {
    pub project_id: u32,
    pub amount: Decimal,
    pub reward_id: Option<u32>,
    /// Amount and reward have been chosen.
    pub step1: bool,
    /// The backer confirmed the pledge and picked a gateway.
    pub step2: bool,
    pub payment_service: String,
}

impl PaymentProcess {
    pub fn new(project_id: u32) -> Self {
        Self {
            project_id,
            ..Self::default()
        }
    }
}

/// Persisted record that lets a gateway callback find the pledge it belongs to.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentSession {
    pub id: u32,
    pub session_id: String,
    #[serde(default)]
    pub unique_key: Option<String>,
    pub project_id: u32,
    #[serde(default)]
    pub reward_id: Option<u32>,
    /// 0 for anonymous backers.
    #[serde(default)]
    pub user_id: u32,
    pub amount: Decimal,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub intention_id: Option<u32>,
    pub record_date: DateTime<Utc>,
}

/// A backer's declared intention to pledge, created before the gateway step.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Intention {
    pub id: u32,
    pub project_id: u32,
    #[serde(default)]
    pub reward_id: Option<u32>,
    #[serde(default)]
    pub user_id: u32,
    pub record_date: DateTime<Utc>,
}

/// The ways a payment session can be addressed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SessionKeys {
    Id(u32),
    SessionId(String),
    UniqueKey(String),
}

impl SessionKeys {
    /// Picks the first usable key in the order id, session id, unique key.
    pub fn pick(id: Option<u32>, session_id: Option<&str>, unique_key: Option<&str>) -> Result<Self> {
        if let Some(id) = id.filter(|id| *id > 0) {
            return Ok(Self::Id(id));
        }
        if let Some(session_id) = session_id.filter(|s| !s.is_empty()) {
            return Ok(Self::SessionId(session_id.to_string()));
        }
        if let Some(unique_key) = unique_key.filter(|s| !s.is_empty()) {
            return Ok(Self::UniqueKey(unique_key.to_string()));
        }
        Err(CrowdfundingError::InvalidArgument(
            "Invalid payment session keys".to_string(),
        ))
    }

    pub fn matches(&self, session: &PaymentSession) -> bool {
        match self {
            Self::Id(id) => session.id == *id,
            Self::SessionId(sid) => session.session_id == *sid,
            Self::UniqueKey(key) => session.unique_key.as_deref() == Some(key.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_prefers_numeric_id() {
        assert_eq!(
            SessionKeys::pick(Some(3), Some("abc"), None).unwrap(),
            SessionKeys::Id(3)
        );
        assert_eq!(
            SessionKeys::pick(Some(0), Some("abc"), Some("k")).unwrap(),
            SessionKeys::SessionId("abc".to_string())
        );
        assert_eq!(
            SessionKeys::pick(None, Some(""), Some("k")).unwrap(),
            SessionKeys::UniqueKey("k".to_string())
        );
    }

    #[test]
    fn test_pick_without_keys_fails() {
        assert!(matches!(
            SessionKeys::pick(None, None, Some("")),
            Err(CrowdfundingError::InvalidArgument(_))
        ));
    }
}
