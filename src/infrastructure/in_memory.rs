use crate::domain::catalog::{Location, ProjectType, Update, UpdateState};
use crate::domain::currency::Currency;
use crate::domain::notification::{LogEntry, User};
use crate::domain::ports::{
    CurrencyStore, IntentionStore, LocationStore, LogStore, PaymentSessionStore, ProjectStore,
    RewardStore, Stores, TransactionStore, TypeStore, UpdateStore, UserDirectory, UserStateStore,
};
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::domain::session::{Intention, PaymentProcess, PaymentSession, SessionKeys};
use crate::domain::transaction::{ExtraData, Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use crate::infrastructure::mailer::LogMailer;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Table<T> = Arc<RwLock<BTreeMap<u32, T>>>;

/// One past the highest key; callers hold the write lock.
fn next_key<T>(rows: &BTreeMap<u32, T>) -> u32 {
    rows.keys().next_back().map_or(1, |last| last + 1)
}

/// A thread-safe in-memory store for projects.
///
/// The funded total is adjusted while holding the write lock, so concurrent
/// pledges cannot lose an update.
#[derive(Default, Clone)]
pub struct InMemoryProjectStore {
    projects: Table<Project>,
}

impl InMemoryProjectStore {
    /// Creates a new, empty in-memory project store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn store(&self, project: Project) -> Result<()> {
        self.projects.write().await.insert(project.id, project);
        Ok(())
    }

    async fn get(&self, project_id: u32) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(&project_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Project>> {
        Ok(self.projects.read().await.values().cloned().collect())
    }

    async fn adjust_funds(&self, project_id: u32, delta: Decimal) -> Result<Project> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| CrowdfundingError::not_found("Project", project_id))?;
        project.add_funds(delta);
        Ok(project.clone())
    }
}

/// A thread-safe in-memory store for rewards.
#[derive(Default, Clone)]
pub struct InMemoryRewardStore {
    rewards: Table<Reward>,
}

impl InMemoryRewardStore {
    /// Creates a new, empty in-memory reward store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardStore for InMemoryRewardStore {
    async fn store(&self, reward: Reward) -> Result<()> {
        self.rewards.write().await.insert(reward.id, reward);
        Ok(())
    }

    async fn get(&self, reward_id: u32) -> Result<Option<Reward>> {
        Ok(self.rewards.read().await.get(&reward_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Reward>> {
        Ok(self.rewards.read().await.values().cloned().collect())
    }

    async fn distribute(&self, reward_id: u32, project_id: u32) -> Result<Reward> {
        let mut rewards = self.rewards.write().await;
        let reward = rewards
            .get_mut(&reward_id)
            .filter(|r| r.project_id == project_id)
            .ok_or(CrowdfundingError::RewardNotFound {
                reward_id,
                project_id,
            })?;
        if reward.available().is_exhausted() {
            return Err(CrowdfundingError::RewardUnavailable(reward_id));
        }
        reward.increase_distributed();
        Ok(reward.clone())
    }

    async fn insert(&self, mut reward: Reward) -> Result<Reward> {
        let mut rewards = self.rewards.write().await;
        reward.id = next_key(&rewards);
        rewards.insert(reward.id, reward.clone());
        Ok(reward)
    }
}

/// A thread-safe in-memory store for transactions.
///
/// Ids are assigned and duplicate gateway ids rejected under the write lock,
/// so concurrent notifications never share a row.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Table<Transaction>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        self.transactions.write().await.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: u32) -> Result<Option<Transaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.read().await.values().cloned().collect())
    }

    async fn find_by_txn_id(
        &self,
        service_alias: &str,
        txn_id: &str,
    ) -> Result<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|tx| tx.service_alias == service_alias && tx.txn_id == txn_id)
            .cloned())
    }

    async fn insert(&self, mut tx: Transaction) -> Result<Transaction> {
        let mut transactions = self.transactions.write().await;
        let duplicate = transactions
            .values()
            .any(|t| t.service_alias == tx.service_alias && t.txn_id == tx.txn_id);
        if duplicate {
            return Err(CrowdfundingError::DuplicateTransaction {
                service_alias: tx.service_alias,
                txn_id: tx.txn_id,
            });
        }
        tx.id = next_key(&transactions);
        transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn update_status(
        &self,
        id: u32,
        status: TransactionStatus,
        extra_data: ExtraData,
    ) -> Result<(Transaction, TransactionStatus)> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| CrowdfundingError::not_found("Transaction", id))?;
        if tx.txn_status == status {
            return Ok((tx.clone(), status));
        }
        let old = std::mem::replace(&mut tx.txn_status, status);
        tx.extra_data.extend(extra_data);
        Ok((tx.clone(), old))
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.transactions.write().await.remove(&id);
        Ok(())
    }
}

/// A thread-safe in-memory store for currencies.
#[derive(Default, Clone)]
pub struct InMemoryCurrencyStore {
    currencies: Table<Currency>,
}

impl InMemoryCurrencyStore {
    /// Creates a new, empty in-memory currency store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurrencyStore for InMemoryCurrencyStore {
    async fn store(&self, currency: Currency) -> Result<()> {
        self.currencies.write().await.insert(currency.id, currency);
        Ok(())
    }

    async fn get(&self, currency_id: u32) -> Result<Option<Currency>> {
        Ok(self.currencies.read().await.get(&currency_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Currency>> {
        Ok(self.currencies.read().await.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for payment sessions.
///
/// Sessions are looked up by any of their keys with a linear scan; the table
/// only holds payments that are still in flight.
#[derive(Default, Clone)]
pub struct InMemoryPaymentSessionStore {
    sessions: Table<PaymentSession>,
}

impl InMemoryPaymentSessionStore {
    /// Creates a new, empty in-memory payment session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentSessionStore for InMemoryPaymentSessionStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn find(&self, keys: &SessionKeys) -> Result<Option<PaymentSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|session| keys.matches(session))
            .cloned())
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn insert(&self, mut session: PaymentSession) -> Result<PaymentSession> {
        let mut sessions = self.sessions.write().await;
        session.id = next_key(&sessions);
        sessions.insert(session.id, session.clone());
        Ok(session)
    }
}

/// A thread-safe in-memory store for payment intentions.
#[derive(Default, Clone)]
pub struct InMemoryIntentionStore {
    intentions: Table<Intention>,
}

impl InMemoryIntentionStore {
    /// Creates a new, empty in-memory intention store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentionStore for InMemoryIntentionStore {
    async fn store(&self, intention: Intention) -> Result<()> {
        self.intentions.write().await.insert(intention.id, intention);
        Ok(())
    }

    async fn get(&self, id: u32) -> Result<Option<Intention>> {
        Ok(self.intentions.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.intentions.write().await.remove(&id);
        Ok(())
    }

    async fn insert(&self, mut intention: Intention) -> Result<Intention> {
        let mut intentions = self.intentions.write().await;
        intention.id = next_key(&intentions);
        intentions.insert(intention.id, intention.clone());
        Ok(intention)
    }
}

/// Session bag keyed by context string.
#[derive(Default, Clone)]
pub struct InMemoryUserStateStore {
    state: Arc<RwLock<HashMap<String, PaymentProcess>>>,
}

impl InMemoryUserStateStore {
    /// Creates a new, empty in-memory user state store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStateStore for InMemoryUserStateStore {
    async fn get(&self, context: &str) -> Result<Option<PaymentProcess>> {
        Ok(self.state.read().await.get(context).cloned())
    }

    async fn set(&self, context: &str, process: PaymentProcess) -> Result<()> {
        self.state.write().await.insert(context.to_string(), process);
        Ok(())
    }

    async fn clear(&self, context: &str) -> Result<()> {
        self.state.write().await.remove(context);
        Ok(())
    }
}

/// A thread-safe in-memory store for locations.
#[derive(Default, Clone)]
pub struct InMemoryLocationStore {
    locations: Table<Location>,
}

impl InMemoryLocationStore {
    /// Creates a new, empty in-memory location store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn store(&self, location: Location) -> Result<()> {
        self.locations.write().await.insert(location.id, location);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Location>> {
        Ok(self.locations.read().await.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for project types.
#[derive(Default, Clone)]
pub struct InMemoryTypeStore {
    types: Table<ProjectType>,
}

impl InMemoryTypeStore {
    /// Creates a new, empty in-memory type store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TypeStore for InMemoryTypeStore {
    async fn store(&self, project_type: ProjectType) -> Result<()> {
        self.types.write().await.insert(project_type.id, project_type);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<ProjectType>> {
        Ok(self.types.read().await.values().cloned().collect())
    }
}

/// A thread-safe in-memory store for project updates.
#[derive(Default, Clone)]
pub struct InMemoryUpdateStore {
    updates: Table<Update>,
}

impl InMemoryUpdateStore {
    /// Creates a new, empty in-memory update store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UpdateStore for InMemoryUpdateStore {
    async fn store(&self, update: Update) -> Result<()> {
        self.updates.write().await.insert(update.id, update);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Update>> {
        Ok(self.updates.read().await.values().cloned().collect())
    }

    async fn set_state(&self, ids: &[u32], state: UpdateState) -> Result<()> {
        let mut updates = self.updates.write().await;
        for id in ids {
            if let Some(update) = updates.get_mut(id) {
                update.state = state;
            }
        }
        Ok(())
    }
}

/// Stand-in for the log table.
#[derive(Default, Clone)]
pub struct InMemoryLogStore {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryLogStore {
    /// Creates a new, empty in-memory log store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, entry: LogEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

/// Users known to the process, filled from the seed.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Table<User>,
}

impl InMemoryUserDirectory {
    /// Creates a new, empty in-memory user directory.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get(&self, user_id: u32) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }
}

impl Stores {
    /// Fresh in-memory adapters for every port, mail goes to the log.
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(InMemoryProjectStore::new()),
            rewards: Arc::new(InMemoryRewardStore::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
            currencies: Arc::new(InMemoryCurrencyStore::new()),
            sessions: Arc::new(InMemoryPaymentSessionStore::new()),
            intentions: Arc::new(InMemoryIntentionStore::new()),
            user_state: Arc::new(InMemoryUserStateStore::new()),
            locations: Arc::new(InMemoryLocationStore::new()),
            types: Arc::new(InMemoryTypeStore::new()),
            updates: Arc::new(InMemoryUpdateStore::new()),
            logs: Arc::new(InMemoryLogStore::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            mailer: Arc::new(LogMailer),
        }
    }
}
