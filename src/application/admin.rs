//! Back-office edits of transactions and rewards.

use super::gateway::GatewayDispatcher;
use super::toolkit::GatewayToolkit;
use crate::domain::ports::Stores;
use crate::domain::reward::Reward;
use crate::domain::transaction::{ExtraData, RewardState, Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Context of status changes made from the back office.
pub const ADMIN_TRANSACTION_CONTEXT: &str = "crowdfunding.transaction";

/// Accepts RFC 3339 or `YYYY-MM-DD HH:MM:SS`; anything else becomes `now`.
pub fn parse_txn_date(text: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return now;
    };
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return date.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|date| date.and_utc())
        .unwrap_or(now)
}

/// Edited transaction fields; `id` 0 creates a new record.
#[derive(Debug, Clone, Default)]
pub struct TransactionForm {
    pub id: u32,
    pub txn_date: Option<String>,
    pub txn_id: String,
    pub parent_txn_id: Option<String>,
    pub txn_amount: Decimal,
    pub txn_currency: String,
    pub txn_status: TransactionStatus,
    pub status_reason: String,
    pub fee: Decimal,
    pub project_id: u32,
    pub reward_id: Option<u32>,
    pub investor_id: u32,
    pub receiver_id: u32,
    pub service_provider: String,
    pub service_alias: String,
}

#[derive(Clone)]
pub struct TransactionService {
    stores: Stores,
    gateways: GatewayDispatcher,
}

impl TransactionService {
    pub fn new(stores: Stores, gateways: GatewayDispatcher) -> Self {
        Self { stores, gateways }
    }

    /// Stores the form and notifies the gateways when the status moved.
    /// A new transaction counts as moving from `pending`.
    pub async fn save(&self, form: TransactionForm) -> Result<Transaction> {
        if form.txn_id.trim().is_empty() {
            return Err(CrowdfundingError::Validation(
                "Transaction id is required".to_string(),
            ));
        }
        let existing = if form.id > 0 {
            Some(
                self.stores
                    .transactions
                    .get(form.id)
                    .await?
                    .ok_or_else(|| CrowdfundingError::not_found("Transaction", form.id))?,
            )
        } else {
            None
        };

        let old = existing
            .as_ref()
            .map_or(TransactionStatus::Pending, |tx| tx.txn_status.clone());
        let (id, extra_data, reward_state) = match existing {
            Some(tx) => (tx.id, tx.extra_data, tx.reward_state),
            None => (0, Default::default(), RewardState::NotSent),
        };

        let transaction = Transaction {
            id,
            txn_date: parse_txn_date(form.txn_date.as_deref(), Utc::now()),
            txn_id: form.txn_id.trim().to_string(),
            parent_txn_id: form.parent_txn_id.filter(|p| !p.trim().is_empty()),
            txn_amount: form.txn_amount,
            txn_currency: form.txn_currency,
            txn_status: form.txn_status,
            status_reason: form.status_reason,
            fee: form.fee,
            extra_data,
            project_id: form.project_id,
            reward_id: form.reward_id.filter(|id| *id > 0),
            investor_id: form.investor_id,
            receiver_id: form.receiver_id,
            service_provider: form.service_provider,
            service_alias: form.service_alias,
            reward_state,
        };
        let transaction = if id > 0 {
            self.stores.transactions.store(transaction.clone()).await?;
            transaction
        } else {
            self.stores.transactions.insert(transaction).await?
        };
        debug!("Transaction {} saved", transaction.id);

        self.notify_change(&transaction, &old).await?;
        Ok(transaction)
    }

    pub async fn change_status(&self, id: u32, status: TransactionStatus) -> Result<Transaction> {
        let transaction = self
            .stores
            .transactions
            .get(id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Transaction", id))?;
        self.move_to(transaction, status).await
    }

    /// Same as `change_status` for a transaction known by its gateway id.
    pub async fn change_status_by_txn_id(
        &self,
        service_alias: &str,
        txn_id: &str,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let transaction = self
            .stores
            .transactions
            .find_by_txn_id(service_alias, txn_id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Transaction", txn_id))?;
        self.move_to(transaction, status).await
    }

    /// Marks rewards of the given transactions as sent or not sent.
    /// Returns how many transactions were updated.
    pub async fn change_reward_state(&self, ids: &[u32], state: RewardState) -> Result<usize> {
        if ids.is_empty() {
            return Err(CrowdfundingError::InvalidArgument(
                "No transactions selected".to_string(),
            ));
        }
        let mut changed = 0;
        for id in ids {
            let Some(mut tx) = self.stores.transactions.get(*id).await? else {
                continue;
            };
            if tx.reward_id.is_none() || tx.reward_state == state {
                continue;
            }
            tx.reward_state = state;
            self.stores.transactions.store(tx).await?;
            changed += 1;
        }
        Ok(changed)
    }

    async fn move_to(&self, transaction: Transaction, status: TransactionStatus) -> Result<Transaction> {
        let (transaction, old) = self
            .stores
            .transactions
            .update_status(transaction.id, status, ExtraData::new())
            .await?;
        self.notify_change(&transaction, &old).await?;
        Ok(transaction)
    }

    async fn notify_change(&self, transaction: &Transaction, old: &TransactionStatus) -> Result<()> {
        if *old == transaction.txn_status {
            return Ok(());
        }
        info!(
            "Transaction {} changed from {old} to {}",
            transaction.txn_id, transaction.txn_status
        );
        self.gateways
            .transaction_change_state(
                ADMIN_TRANSACTION_CONTEXT,
                transaction,
                old,
                &transaction.txn_status,
            )
            .await
    }
}

/// Longest reward title kept, in characters.
pub const REWARD_TITLE_LIMIT: usize = 128;
/// Longest reward description kept, in characters.
pub const REWARD_DESCRIPTION_LIMIT: usize = 500;

/// Edited reward fields; `id` 0 creates a new reward at the end of the list.
///
/// `amount` is the text typed into the form, in the component's number format.
#[derive(Debug, Clone, Default)]
pub struct RewardForm {
    pub id: u32,
    pub project_id: u32,
    pub title: String,
    pub description: String,
    pub amount: String,
    pub number: u32,
    pub delivery: Option<NaiveDate>,
    pub shipping: bool,
    pub published: bool,
}

fn clip(text: &str, limit: usize) -> String {
    text.trim().chars().take(limit).collect()
}

#[derive(Clone)]
pub struct RewardService {
    toolkit: GatewayToolkit,
}

impl RewardService {
    pub fn new(toolkit: GatewayToolkit) -> Self {
        Self { toolkit }
    }

    pub async fn save(&self, form: RewardForm) -> Result<Reward> {
        let title = clip(&form.title, REWARD_TITLE_LIMIT);
        if title.is_empty() {
            return Err(CrowdfundingError::Validation(
                "Reward title is required".to_string(),
            ));
        }
        let description = clip(&form.description, REWARD_DESCRIPTION_LIMIT);
        if description.is_empty() {
            return Err(CrowdfundingError::Validation(
                "Reward description is required".to_string(),
            ));
        }
        // Unreadable input counts as no amount at all
        let amount = self
            .toolkit
            .formatter()
            .await?
            .parse(&form.amount)
            .unwrap_or_default();
        if amount <= Decimal::ZERO {
            return Err(CrowdfundingError::Validation(format!(
                "Invalid reward amount '{}'",
                form.amount.trim()
            )));
        }

        let stores = self.toolkit.stores();
        if stores.projects.get(form.project_id).await?.is_none() {
            return Err(CrowdfundingError::not_found("Project", form.project_id));
        }

        let mut reward = Reward {
            id: form.id,
            project_id: form.project_id,
            title,
            description,
            amount,
            number: form.number,
            distributed: 0,
            delivery: form.delivery,
            shipping: form.shipping,
            published: form.published,
            ordering: 0,
        };

        if form.id > 0 {
            let existing = stores
                .rewards
                .get(form.id)
                .await?
                .ok_or_else(|| CrowdfundingError::not_found("Reward", form.id))?;
            reward.distributed = existing.distributed;
            reward.ordering = existing.ordering;
            stores.rewards.store(reward.clone()).await?;
            return Ok(reward);
        }

        reward.ordering = stores
            .rewards
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.project_id == form.project_id)
            .map(|r| r.ordering)
            .max()
            .unwrap_or(0)
            + 1;
        let reward = stores.rewards.insert(reward).await?;
        debug!("Reward {} added to project {}", reward.id, reward.project_id);
        Ok(reward)
    }
}
