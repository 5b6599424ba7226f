use super::catalog::{Location, ProjectType, Update, UpdateState};
use super::currency::Currency;
use super::notification::{LogEntry, MailMessage, User};
use super::project::Project;
use super::reward::Reward;
use super::session::{Intention, PaymentProcess, PaymentSession, SessionKeys};
use super::transaction::{ExtraData, Transaction, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn store(&self, project: Project) -> Result<()>;
    async fn get(&self, project_id: u32) -> Result<Option<Project>>;
    async fn get_all(&self) -> Result<Vec<Project>>;
    /// Adds `delta` (negative to remove) to the funded total in one step.
    async fn adjust_funds(&self, project_id: u32, delta: Decimal) -> Result<Project>;
}

#[async_trait]
pub trait RewardStore: Send + Sync {
    async fn store(&self, reward: Reward) -> Result<()>;
    async fn get(&self, reward_id: u32) -> Result<Option<Reward>>;
    async fn get_all(&self) -> Result<Vec<Reward>>;
    /// Checks availability and increments `distributed` in one step.
    async fn distribute(&self, reward_id: u32, project_id: u32) -> Result<Reward>;
    /// Stores a new reward under the next free id and returns it.
    async fn insert(&self, reward: Reward) -> Result<Reward>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn store(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: u32) -> Result<Option<Transaction>>;
    async fn get_all(&self) -> Result<Vec<Transaction>>;
    /// Looks a transaction up by the identifier its gateway assigned.
    async fn find_by_txn_id(&self, service_alias: &str, txn_id: &str)
    -> Result<Option<Transaction>>;
    /// Stores a new transaction under the next free id and returns it.
    ///
    /// Fails with `DuplicateTransaction` when the same gateway already
    /// recorded `txn_id`; the check and the write happen in one step.
    async fn insert(&self, tx: Transaction) -> Result<Transaction>;
    /// Moves the transaction to `status` and merges `extra_data` in one
    /// step. Returns the transaction with the status it had before; nothing
    /// is written when the status does not change.
    async fn update_status(
        &self,
        id: u32,
        status: TransactionStatus,
        extra_data: ExtraData,
    ) -> Result<(Transaction, TransactionStatus)>;
    async fn delete(&self, id: u32) -> Result<()>;
}

#[async_trait]
pub trait CurrencyStore: Send + Sync {
    async fn store(&self, currency: Currency) -> Result<()>;
    async fn get(&self, currency_id: u32) -> Result<Option<Currency>>;
    async fn get_all(&self) -> Result<Vec<Currency>>;
}

#[async_trait]
pub trait PaymentSessionStore: Send + Sync {
    async fn store(&self, session: PaymentSession) -> Result<()>;
    async fn find(&self, keys: &SessionKeys) -> Result<Option<PaymentSession>>;
    async fn delete(&self, id: u32) -> Result<()>;
    /// Stores a new session under the next free id and returns it.
    async fn insert(&self, session: PaymentSession) -> Result<PaymentSession>;
}

#[async_trait]
pub trait IntentionStore: Send + Sync {
    async fn store(&self, intention: Intention) -> Result<()>;
    async fn get(&self, id: u32) -> Result<Option<Intention>>;
    async fn delete(&self, id: u32) -> Result<()>;
    /// Stores a new intention under the next free id and returns it.
    async fn insert(&self, intention: Intention) -> Result<Intention>;
}

/// Per-user session state, the equivalent of a web session bag.
#[async_trait]
pub trait UserStateStore: Send + Sync {
    async fn get(&self, context: &str) -> Result<Option<PaymentProcess>>;
    async fn set(&self, context: &str, process: PaymentProcess) -> Result<()>;
    async fn clear(&self, context: &str) -> Result<()>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn store(&self, location: Location) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<Location>>;
}

#[async_trait]
pub trait TypeStore: Send + Sync {
    async fn store(&self, project_type: ProjectType) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<ProjectType>>;
}

#[async_trait]
pub trait UpdateStore: Send + Sync {
    async fn store(&self, update: Update) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<Update>>;
    async fn set_state(&self, ids: &[u32], state: UpdateState) -> Result<()>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, entry: LogEntry) -> Result<()>;
    async fn entries(&self) -> Result<Vec<LogEntry>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, user_id: u32) -> Result<Option<User>>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

pub type ProjectStoreRef = Arc<dyn ProjectStore>;
pub type RewardStoreRef = Arc<dyn RewardStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type CurrencyStoreRef = Arc<dyn CurrencyStore>;
pub type PaymentSessionStoreRef = Arc<dyn PaymentSessionStore>;
pub type IntentionStoreRef = Arc<dyn IntentionStore>;
pub type UserStateStoreRef = Arc<dyn UserStateStore>;
pub type LocationStoreRef = Arc<dyn LocationStore>;
pub type TypeStoreRef = Arc<dyn TypeStore>;
pub type UpdateStoreRef = Arc<dyn UpdateStore>;
pub type LogStoreRef = Arc<dyn LogStore>;
pub type UserDirectoryRef = Arc<dyn UserDirectory>;
pub type MailerRef = Arc<dyn Mailer>;

/// Every port the services need, bundled so adapters can be swapped at once.
#[derive(Clone)]
pub struct Stores {
    pub projects: ProjectStoreRef,
    pub rewards: RewardStoreRef,
    pub transactions: TransactionStoreRef,
    pub currencies: CurrencyStoreRef,
    pub sessions: PaymentSessionStoreRef,
    pub intentions: IntentionStoreRef,
    pub user_state: UserStateStoreRef,
    pub locations: LocationStoreRef,
    pub types: TypeStoreRef,
    pub updates: UpdateStoreRef,
    pub logs: LogStoreRef,
    pub users: UserDirectoryRef,
    pub mailer: MailerRef,
}
