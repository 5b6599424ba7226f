use crate::domain::catalog::ProjectType;
use crate::domain::currency::Currency;
use crate::domain::ports::{CurrencyStoreRef, TypeStoreRef};
use crate::error::{CrowdfundingError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Loads currencies on first use and keeps them for the registry's lifetime.
#[derive(Clone)]
pub struct CurrencyRegistry {
    store: CurrencyStoreRef,
    cache: Arc<RwLock<HashMap<u32, Currency>>>,
}

impl CurrencyRegistry {
    pub fn new(store: CurrencyStoreRef) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, currency_id: u32) -> Result<Currency> {
        if currency_id == 0 {
            return Err(CrowdfundingError::InvalidArgument(
                "Invalid currency id".to_string(),
            ));
        }
        if let Some(currency) = self.cache.read().await.get(&currency_id) {
            return Ok(currency.clone());
        }

        let currency = self
            .store
            .get(currency_id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Currency", currency_id))?;
        debug!("Currency {currency_id} loaded");
        self.cache
            .write()
            .await
            .insert(currency_id, currency.clone());
        Ok(currency)
    }

    /// Currencies with the given ids, or all of them when `ids` is empty.
    pub async fn by_ids(&self, ids: &[u32]) -> Result<Vec<Currency>> {
        let all = self.store.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|c| ids.is_empty() || ids.contains(&c.id))
            .collect())
    }

    /// Currencies with the given ISO codes, or all of them when `codes` is empty.
    pub async fn by_codes(&self, codes: &[&str]) -> Result<Vec<Currency>> {
        let all = self.store.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|c| codes.is_empty() || codes.contains(&c.code.as_str()))
            .collect())
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Currency>> {
        if code.is_empty() {
            return Err(CrowdfundingError::InvalidArgument(
                "Invalid currency abbreviation".to_string(),
            ));
        }
        Ok(self.by_codes(&[code]).await?.into_iter().next())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TypeOrder {
    #[default]
    Id,
    Title,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Project types, loaded once and shared.
#[derive(Clone)]
pub struct TypeRegistry {
    store: TypeStoreRef,
    cache: Arc<RwLock<Option<Vec<ProjectType>>>>,
}

impl TypeRegistry {
    pub fn new(store: TypeStoreRef) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    async fn load(&self) -> Result<Vec<ProjectType>> {
        if let Some(types) = self.cache.read().await.as_ref() {
            return Ok(types.clone());
        }
        let types = self.store.get_all().await?;
        *self.cache.write().await = Some(types.clone());
        Ok(types)
    }

    pub async fn get(&self, type_id: u32) -> Result<Option<ProjectType>> {
        Ok(self.load().await?.into_iter().find(|t| t.id == type_id))
    }

    pub async fn list(&self, order: TypeOrder, direction: Direction) -> Result<Vec<ProjectType>> {
        let mut types = self.load().await?;
        match order {
            TypeOrder::Id => types.sort_by_key(|t| t.id),
            TypeOrder::Title => types.sort_by(|a, b| a.title.cmp(&b.title)),
        }
        if direction == Direction::Desc {
            types.reverse();
        }
        Ok(types)
    }
}
