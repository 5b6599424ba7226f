use crate::domain::catalog::{Location, ProjectType, Update, UpdateState};
use crate::domain::currency::Currency;
use crate::domain::notification::{LogEntry, User};
use crate::domain::ports::{
    CurrencyStore, IntentionStore, LocationStore, LogStore, MailerRef, PaymentSessionStore,
    ProjectStore, RewardStore, Stores, TransactionStore, TypeStore, UpdateStore, UserDirectory,
    UserStateStore,
};
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::domain::session::{Intention, PaymentProcess, PaymentSession, SessionKeys};
use crate::domain::transaction::{ExtraData, Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_PROJECTS: &str = "projects";
pub const CF_REWARDS: &str = "rewards";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_CURRENCIES: &str = "currencies";
pub const CF_SESSIONS: &str = "payment_sessions";
pub const CF_INTENTIONS: &str = "intentions";
pub const CF_USER_STATE: &str = "user_state";
pub const CF_LOCATIONS: &str = "locations";
pub const CF_TYPES: &str = "types";
pub const CF_UPDATES: &str = "updates";
pub const CF_LOGS: &str = "logs";
pub const CF_USERS: &str = "users";

const COLUMN_FAMILIES: [&str; 12] = [
    CF_PROJECTS,
    CF_REWARDS,
    CF_TRANSACTIONS,
    CF_CURRENCIES,
    CF_SESSIONS,
    CF_INTENTIONS,
    CF_USER_STATE,
    CF_LOCATIONS,
    CF_TYPES,
    CF_UPDATES,
    CF_LOGS,
    CF_USERS,
];

/// A persistent store implementation using RocksDB.
///
/// Every entity lives in its own column family, keyed by its big-endian id and
/// stored as JSON. Read-modify-write operations (`adjust_funds`, `distribute`,
/// the `insert`s that pick the next id) hold `write_lock` so they stay atomic
/// across clones sharing the handle.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path` with all column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Wires this store behind every storage port.
    pub fn into_stores(self, mailer: MailerRef) -> Stores {
        let store = Arc::new(self);
        Stores {
            projects: store.clone(),
            rewards: store.clone(),
            transactions: store.clone(),
            currencies: store.clone(),
            sessions: store.clone(),
            intentions: store.clone(),
            user_state: store.clone(),
            locations: store.clone(),
            types: store.clone(),
            updates: store.clone(),
            logs: store.clone(),
            users: store,
            mailer,
        }
    }

    pub async fn store_user(&self, user: User) -> Result<()> {
        self.put(CF_USERS, &user.id.to_be_bytes(), &user)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            CrowdfundingError::Storage(Box::new(std::io::Error::other(format!(
                "Column family {name} not found"
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(handle, key, bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, cf: &str, key: &[u8]) -> Result<()> {
        let handle = self.cf(cf)?;
        self.db.delete_cf(handle, key)?;
        Ok(())
    }

    fn all<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// One past the highest big-endian `u32` key of the family.
    fn next_key(&self, cf: &str) -> Result<u32> {
        let handle = self.cf(cf)?;
        let last = self.db.iterator_cf(handle, IteratorMode::End).next();
        match last {
            Some(item) => {
                let (key, _value) = item?;
                let bytes: [u8; 4] = key.as_ref().try_into().map_err(|_| {
                    CrowdfundingError::Storage(Box::new(std::io::Error::other(format!(
                        "Malformed key in {cf}"
                    ))))
                })?;
                Ok(u32::from_be_bytes(bytes) + 1)
            }
            None => Ok(1),
        }
    }
}

#[async_trait]
impl ProjectStore for RocksDBStore {
    async fn store(&self, project: Project) -> Result<()> {
        self.put(CF_PROJECTS, &project.id.to_be_bytes(), &project)
    }

    async fn get(&self, project_id: u32) -> Result<Option<Project>> {
        self.fetch(CF_PROJECTS, &project_id.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<Project>> {
        self.all(CF_PROJECTS)
    }

    async fn adjust_funds(&self, project_id: u32, delta: Decimal) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let mut project: Project = self
            .fetch(CF_PROJECTS, &project_id.to_be_bytes())?
            .ok_or_else(|| CrowdfundingError::not_found("Project", project_id))?;
        project.add_funds(delta);
        self.put(CF_PROJECTS, &project_id.to_be_bytes(), &project)?;
        Ok(project)
    }
}

#[async_trait]
impl RewardStore for RocksDBStore {
    async fn store(&self, reward: Reward) -> Result<()> {
        self.put(CF_REWARDS, &reward.id.to_be_bytes(), &reward)
    }

    async fn get(&self, reward_id: u32) -> Result<Option<Reward>> {
        self.fetch(CF_REWARDS, &reward_id.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<Reward>> {
        self.all(CF_REWARDS)
    }

    async fn distribute(&self, reward_id: u32, project_id: u32) -> Result<Reward> {
        let _guard = self.write_lock.lock().await;
        let mut reward: Reward = self
            .fetch::<Reward>(CF_REWARDS, &reward_id.to_be_bytes())?
            .filter(|r| r.project_id == project_id)
            .ok_or(CrowdfundingError::RewardNotFound {
                reward_id,
                project_id,
            })?;
        if reward.available().is_exhausted() {
            return Err(CrowdfundingError::RewardUnavailable(reward_id));
        }
        reward.increase_distributed();
        self.put(CF_REWARDS, &reward_id.to_be_bytes(), &reward)?;
        Ok(reward)
    }

    async fn insert(&self, mut reward: Reward) -> Result<Reward> {
        let _guard = self.write_lock.lock().await;
        reward.id = self.next_key(CF_REWARDS)?;
        self.put(CF_REWARDS, &reward.id.to_be_bytes(), &reward)?;
        Ok(reward)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        self.put(CF_TRANSACTIONS, &tx.id.to_be_bytes(), &tx)
    }

    async fn get(&self, id: u32) -> Result<Option<Transaction>> {
        self.fetch(CF_TRANSACTIONS, &id.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        self.all(CF_TRANSACTIONS)
    }

    async fn find_by_txn_id(
        &self,
        service_alias: &str,
        txn_id: &str,
    ) -> Result<Option<Transaction>> {
        let transactions: Vec<Transaction> = self.all(CF_TRANSACTIONS)?;
        Ok(transactions
            .into_iter()
            .find(|tx| tx.service_alias == service_alias && tx.txn_id == txn_id))
    }

    async fn insert(&self, mut tx: Transaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let transactions: Vec<Transaction> = self.all(CF_TRANSACTIONS)?;
        if transactions
            .iter()
            .any(|t| t.service_alias == tx.service_alias && t.txn_id == tx.txn_id)
        {
            return Err(CrowdfundingError::DuplicateTransaction {
                service_alias: tx.service_alias,
                txn_id: tx.txn_id,
            });
        }
        tx.id = self.next_key(CF_TRANSACTIONS)?;
        self.put(CF_TRANSACTIONS, &tx.id.to_be_bytes(), &tx)?;
        Ok(tx)
    }

    async fn update_status(
        &self,
        id: u32,
        status: TransactionStatus,
        extra_data: ExtraData,
    ) -> Result<(Transaction, TransactionStatus)> {
        let _guard = self.write_lock.lock().await;
        let mut tx: Transaction = self
            .fetch(CF_TRANSACTIONS, &id.to_be_bytes())?
            .ok_or_else(|| CrowdfundingError::not_found("Transaction", id))?;
        if tx.txn_status == status {
            return Ok((tx, status));
        }
        let old = std::mem::replace(&mut tx.txn_status, status);
        tx.extra_data.extend(extra_data);
        self.put(CF_TRANSACTIONS, &id.to_be_bytes(), &tx)?;
        Ok((tx, old))
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.remove(CF_TRANSACTIONS, &id.to_be_bytes())
    }
}

#[async_trait]
impl CurrencyStore for RocksDBStore {
    async fn store(&self, currency: Currency) -> Result<()> {
        self.put(CF_CURRENCIES, &currency.id.to_be_bytes(), &currency)
    }

    async fn get(&self, currency_id: u32) -> Result<Option<Currency>> {
        self.fetch(CF_CURRENCIES, &currency_id.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<Currency>> {
        self.all(CF_CURRENCIES)
    }
}

#[async_trait]
impl PaymentSessionStore for RocksDBStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        self.put(CF_SESSIONS, &session.id.to_be_bytes(), &session)
    }

    async fn find(&self, keys: &SessionKeys) -> Result<Option<PaymentSession>> {
        if let SessionKeys::Id(id) = keys {
            return self.fetch(CF_SESSIONS, &id.to_be_bytes());
        }
        let sessions: Vec<PaymentSession> = self.all(CF_SESSIONS)?;
        Ok(sessions.into_iter().find(|session| keys.matches(session)))
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.remove(CF_SESSIONS, &id.to_be_bytes())
    }

    async fn insert(&self, mut session: PaymentSession) -> Result<PaymentSession> {
        let _guard = self.write_lock.lock().await;
        session.id = self.next_key(CF_SESSIONS)?;
        self.put(CF_SESSIONS, &session.id.to_be_bytes(), &session)?;
        Ok(session)
    }
}

#[async_trait]
impl IntentionStore for RocksDBStore {
    async fn store(&self, intention: Intention) -> Result<()> {
        self.put(CF_INTENTIONS, &intention.id.to_be_bytes(), &intention)
    }

    async fn get(&self, id: u32) -> Result<Option<Intention>> {
        self.fetch(CF_INTENTIONS, &id.to_be_bytes())
    }

    async fn delete(&self, id: u32) -> Result<()> {
        self.remove(CF_INTENTIONS, &id.to_be_bytes())
    }

    async fn insert(&self, mut intention: Intention) -> Result<Intention> {
        let _guard = self.write_lock.lock().await;
        intention.id = self.next_key(CF_INTENTIONS)?;
        self.put(CF_INTENTIONS, &intention.id.to_be_bytes(), &intention)?;
        Ok(intention)
    }
}

#[async_trait]
impl UserStateStore for RocksDBStore {
    async fn get(&self, context: &str) -> Result<Option<PaymentProcess>> {
        self.fetch(CF_USER_STATE, context.as_bytes())
    }

    async fn set(&self, context: &str, process: PaymentProcess) -> Result<()> {
        self.put(CF_USER_STATE, context.as_bytes(), &process)
    }

    async fn clear(&self, context: &str) -> Result<()> {
        self.remove(CF_USER_STATE, context.as_bytes())
    }
}

#[async_trait]
impl LocationStore for RocksDBStore {
    async fn store(&self, location: Location) -> Result<()> {
        self.put(CF_LOCATIONS, &location.id.to_be_bytes(), &location)
    }

    async fn get_all(&self) -> Result<Vec<Location>> {
        self.all(CF_LOCATIONS)
    }
}

#[async_trait]
impl TypeStore for RocksDBStore {
    async fn store(&self, project_type: ProjectType) -> Result<()> {
        self.put(CF_TYPES, &project_type.id.to_be_bytes(), &project_type)
    }

    async fn get_all(&self) -> Result<Vec<ProjectType>> {
        self.all(CF_TYPES)
    }
}

#[async_trait]
impl UpdateStore for RocksDBStore {
    async fn store(&self, update: Update) -> Result<()> {
        self.put(CF_UPDATES, &update.id.to_be_bytes(), &update)
    }

    async fn get_all(&self) -> Result<Vec<Update>> {
        self.all(CF_UPDATES)
    }

    async fn set_state(&self, ids: &[u32], state: UpdateState) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        for id in ids {
            if let Some(mut update) = self.fetch::<Update>(CF_UPDATES, &id.to_be_bytes())? {
                update.state = state;
                self.put(CF_UPDATES, &id.to_be_bytes(), &update)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for RocksDBStore {
    async fn append(&self, entry: LogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = self.next_key(CF_LOGS)?;
        self.put(CF_LOGS, &key.to_be_bytes(), &entry)
    }

    async fn entries(&self) -> Result<Vec<LogEntry>> {
        self.all(CF_LOGS)
    }
}

#[async_trait]
impl UserDirectory for RocksDBStore {
    async fn get(&self, user_id: u32) -> Result<Option<User>> {
        self.fetch(CF_USERS, &user_id.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::tests::sample_project;
    use crate::domain::reward::tests::sample_reward;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_project_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let project = sample_project();

        ProjectStore::store(&store, project.clone()).await.unwrap();
        let retrieved = ProjectStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(retrieved, project);

        let funded = store.adjust_funds(1, dec!(75)).await.unwrap();
        assert_eq!(funded.funded.value(), dec!(75));

        let all = ProjectStore::get_all(&store).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].funded.value(), dec!(75));
    }

    #[tokio::test]
    async fn test_rocksdb_distribute_and_insert() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let mut reward = sample_reward();
        reward.distributed = 9;

        RewardStore::store(&store, reward).await.unwrap();
        assert_eq!(store.distribute(7, 1).await.unwrap().distributed, 10);
        assert!(matches!(
            store.distribute(7, 1).await,
            Err(CrowdfundingError::RewardUnavailable(7))
        ));
        let inserted = RewardStore::insert(&store, sample_reward()).await.unwrap();
        assert_eq!(inserted.id, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rocksdb_concurrent_transaction_inserts() {
        use crate::application::collections::tests::sample_transaction;

        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut handles = Vec::new();
        for i in 0..40u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = sample_transaction(0, TransactionStatus::Pending);
                tx.txn_id = format!("T{}", i / 2);
                TransactionStore::insert(&store, tx).await
            }));
        }
        let mut stored = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => stored += 1,
                Err(err) => assert!(matches!(err, CrowdfundingError::DuplicateTransaction { .. })),
            }
        }

        assert_eq!(stored, 20);
        let all = TransactionStore::get_all(&store).await.unwrap();
        assert_eq!(all.len(), 20);

        let (tx, old) = store
            .update_status(all[0].id, TransactionStatus::Completed, ExtraData::new())
            .await
            .unwrap();
        assert_eq!(old, TransactionStatus::Pending);
        assert!(tx.txn_status.is_completed());
    }

    #[tokio::test]
    async fn test_rocksdb_user_state() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let mut process = PaymentProcess::new(1);
        process.amount = dec!(30);

        store.set("payment.abc.1", process.clone()).await.unwrap();
        assert_eq!(
            UserStateStore::get(&store, "payment.abc.1").await.unwrap(),
            Some(process)
        );
        store.clear("payment.abc.1").await.unwrap();
        assert!(UserStateStore::get(&store, "payment.abc.1")
            .await
            .unwrap()
            .is_none());
    }
}
