//! Reference and content rows without a lifecycle of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Location {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub country_code: String,
    #[serde(default)]
    pub state_code: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub published: bool,
}

/// How a search phrase is matched against location names.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum NameMatch {
    Exact,
    #[default]
    Prefix,
    Suffix,
    Contains,
}

impl NameMatch {
    pub fn matches(&self, name: &str, phrase: &str) -> bool {
        let name = name.to_lowercase();
        let phrase = phrase.to_lowercase();
        match self {
            Self::Exact => name == phrase,
            Self::Prefix => name.starts_with(&phrase),
            Self::Suffix => name.ends_with(&phrase),
            Self::Contains => name.contains(&phrase),
        }
    }
}

/// Project type, e.g. "Film" or "Hardware".
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProjectType {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    #[default]
    NotSent,
    Sent,
}

/// News posted by a project owner to the backers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Update {
    pub id: u32,
    pub project_id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub record_date: DateTime<Utc>,
    #[serde(default)]
    pub state: UpdateState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_match_modes() {
        assert!(NameMatch::Exact.matches("Plovdiv", "plovdiv"));
        assert!(!NameMatch::Exact.matches("Plovdiv", "plov"));
        assert!(NameMatch::Prefix.matches("Plovdiv", "Plov"));
        assert!(NameMatch::Suffix.matches("Plovdiv", "div"));
        assert!(NameMatch::Contains.matches("Plovdiv", "ovd"));
        assert!(!NameMatch::Prefix.matches("Plovdiv", "div"));
    }
}
