//! Project updates and locations.

use crate::domain::catalog::{Location, NameMatch, Update, UpdateState};
use crate::domain::ports::{LocationStoreRef, UpdateStoreRef};
use crate::error::{CrowdfundingError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Result size of a location search without an explicit limit.
pub const LOCATION_SEARCH_LIMIT: usize = 8;

/// Which updates of a project to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateQuery {
    pub project_id: u32,
    /// Only updates posted within this many days.
    pub period: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct Updates {
    store: UpdateStoreRef,
}

impl Updates {
    pub fn new(store: UpdateStoreRef) -> Self {
        Self { store }
    }

    /// Newest first.
    pub async fn list(&self, query: &UpdateQuery, now: DateTime<Utc>) -> Result<Vec<Update>> {
        if query.project_id == 0 {
            return Err(CrowdfundingError::InvalidArgument(
                "Invalid project id".to_string(),
            ));
        }
        let since = query
            .period
            .filter(|days| *days > 0)
            .map(|days| now - Duration::days(i64::from(days)));

        let mut updates: Vec<Update> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|u| u.project_id == query.project_id)
            .filter(|u| since.is_none_or(|since| u.record_date >= since))
            .collect();
        updates.sort_by(|a, b| b.record_date.cmp(&a.record_date).then(b.id.cmp(&a.id)));
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            updates.truncate(limit);
        }
        Ok(updates)
    }

    pub async fn change_state(&self, ids: &[u32], state: UpdateState) -> Result<()> {
        if ids.is_empty() {
            return Err(CrowdfundingError::InvalidArgument(
                "No updates selected".to_string(),
            ));
        }
        self.store.set_state(ids, state).await?;
        debug!("Updates {ids:?} marked {state:?}");
        Ok(())
    }
}

/// An entry of the location autocomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationOption {
    pub id: u32,
    /// `name, state_code, country_code`, without an empty state code.
    pub label: String,
}

impl From<&Location> for LocationOption {
    fn from(location: &Location) -> Self {
        let label = if location.state_code.is_empty() {
            format!("{}, {}", location.name, location.country_code)
        } else {
            format!(
                "{}, {}, {}",
                location.name, location.state_code, location.country_code
            )
        };
        Self {
            id: location.id,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationKey {
    Id(u32),
    Name(String),
}

#[derive(Clone)]
pub struct Locations {
    store: LocationStoreRef,
}

impl Locations {
    pub fn new(store: LocationStoreRef) -> Self {
        Self { store }
    }

    pub async fn by_ids(&self, ids: &[u32]) -> Result<Vec<Location>> {
        if ids.is_empty() {
            return Err(CrowdfundingError::InvalidArgument(
                "No location ids given".to_string(),
            ));
        }
        Ok(self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|l| ids.contains(&l.id))
            .collect())
    }

    /// Names matching `phrase`, sorted by name.
    pub async fn search(
        &self,
        phrase: &str,
        mode: NameMatch,
        limit: Option<usize>,
    ) -> Result<Vec<LocationOption>> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Ok(Vec::new());
        }
        let mut found: Vec<Location> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(|l| mode.matches(&l.name, phrase))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(found
            .iter()
            .take(limit.unwrap_or(LOCATION_SEARCH_LIMIT))
            .map(LocationOption::from)
            .collect())
    }

    pub async fn get(&self, key: &LocationKey) -> Result<Option<Location>> {
        match key {
            LocationKey::Id(0) => Err(CrowdfundingError::InvalidArgument(
                "Invalid location id".to_string(),
            )),
            LocationKey::Name(name) if name.trim().is_empty() => Err(
                CrowdfundingError::InvalidArgument("Invalid location name".to_string()),
            ),
            LocationKey::Id(id) => Ok(self
                .store
                .get_all()
                .await?
                .into_iter()
                .find(|l| l.id == *id)),
            LocationKey::Name(name) => Ok(self
                .store
                .get_all()
                .await?
                .into_iter()
                .find(|l| NameMatch::Exact.matches(&l.name, name.trim()))),
        }
    }
}
