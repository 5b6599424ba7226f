use crate::domain::catalog::{Location, ProjectType, Update};
use crate::domain::currency::Currency;
use crate::domain::notification::User;
use crate::domain::ports::Stores;
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Initial catalog loaded before events are replayed.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Seed {
    pub projects: Vec<Project>,
    pub rewards: Vec<Reward>,
    pub currencies: Vec<Currency>,
    pub users: Vec<User>,
    pub locations: Vec<Location>,
    pub types: Vec<ProjectType>,
    pub updates: Vec<Update>,
}

impl Seed {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Writes everything except users, which belong to the user directory
    /// adapter.
    pub async fn apply(&self, stores: &Stores) -> Result<()> {
        for project in &self.projects {
            stores.projects.store(project.clone()).await?;
        }
        for reward in &self.rewards {
            stores.rewards.store(reward.clone()).await?;
        }
        for currency in &self.currencies {
            stores.currencies.store(currency.clone()).await?;
        }
        for location in &self.locations {
            stores.locations.store(location.clone()).await?;
        }
        for project_type in &self.types {
            stores.types.store(project_type.clone()).await?;
        }
        for update in &self.updates {
            stores.updates.store(update.clone()).await?;
        }
        info!(
            "Seeded {} projects, {} rewards and {} currencies",
            self.projects.len(),
            self.rewards.len(),
            self.currencies.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SEED: &str = r#"{
        "projects": [{
            "id": 1,
            "title": "Solar kiln",
            "alias": "solar-kiln",
            "goal": "200",
            "funding_type": "FIXED",
            "funding_start": "2024-03-01",
            "funding_days": 10,
            "published": true,
            "approved": true,
            "user_id": 42
        }],
        "rewards": [{
            "id": 7,
            "project_id": 1,
            "title": "Signed mug",
            "amount": "25",
            "number": 10,
            "distributed": 7
        }],
        "currencies": [{
            "id": 1,
            "title": "US Dollar",
            "code": "USD",
            "symbol": "$",
            "position": "beginning"
        }],
        "users": [{ "id": 42, "name": "Grace", "email": "grace@example.com" }]
    }"#;

    #[tokio::test]
    async fn test_apply_fills_the_stores() {
        let seed = Seed::from_json(SEED).unwrap();
        assert_eq!(seed.users.len(), 1);
        assert!(seed.locations.is_empty());

        let stores = Stores::in_memory();
        seed.apply(&stores).await.unwrap();

        let project = stores.projects.get(1).await.unwrap().unwrap();
        assert_eq!(project.goal, dec!(200));
        assert_eq!(project.funded.value(), dec!(0));
        let reward = stores.rewards.get(7).await.unwrap().unwrap();
        assert_eq!(reward.distributed, 7);
        assert_eq!(stores.currencies.get_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_seed_fails() {
        assert!(Seed::from_json(r#"{"projects": [{"id": "x"}]}"#).is_err());
    }
}
