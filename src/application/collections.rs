use crate::domain::money::{self, Funds};
use crate::domain::ports::{ProjectStoreRef, RewardStoreRef, Stores, TransactionStoreRef};
use crate::domain::project::{Project, ResultState};
use crate::domain::reward::Reward;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Selects projects by id and/or owner, optionally by state.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub ids: Vec<u32>,
    pub user_ids: Vec<u32>,
    pub published: Option<bool>,
    pub approved: Option<bool>,
}

impl ProjectFilter {
    fn states_match(&self, project: &Project) -> bool {
        self.published.is_none_or(|p| project.published == p)
            && self.approved.is_none_or(|a| project.approved == a)
    }
}

/// Where a campaign stands on a given day.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CampaignState {
    Active,
    Finished(ResultState),
}

impl CampaignState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished(ResultState::Successful) => "successful",
            Self::Finished(ResultState::Completed) => "completed",
        }
    }
}

/// The numbers shown on a project card.
#[derive(Debug, PartialEq, Clone)]
pub struct ProjectSummary {
    pub project_id: u32,
    pub title: String,
    pub goal: Decimal,
    pub funded: Funds,
    /// Raw percent, may exceed 100.
    pub percent: Decimal,
    /// Percent clamped for a progress bar.
    pub progress_width: Decimal,
    pub funders: usize,
    pub days_left: Option<u32>,
    pub state: CampaignState,
}

impl ProjectSummary {
    pub fn of(project: &Project, funders: usize, today: NaiveDate) -> Self {
        let percent = project.percent();
        let days_left = project.days_left(today);
        let state = match days_left {
            Some(0) => CampaignState::Finished(project.result_state()),
            _ => CampaignState::Active,
        };
        Self {
            project_id: project.id,
            title: project.title.clone(),
            goal: project.goal,
            funded: project.funded,
            percent,
            progress_width: money::progress_width(percent),
            funders,
            days_left,
            state,
        }
    }
}

/// Read-side queries over projects, rewards and transactions.
#[derive(Clone)]
pub struct Collections {
    projects: ProjectStoreRef,
    rewards: RewardStoreRef,
    transactions: TransactionStoreRef,
}

impl Collections {
    pub fn new(stores: &Stores) -> Self {
        Self {
            projects: stores.projects.clone(),
            rewards: stores.rewards.clone(),
            transactions: stores.transactions.clone(),
        }
    }

    pub async fn projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        if filter.ids.is_empty() && filter.user_ids.is_empty() {
            return Err(CrowdfundingError::InvalidArgument(
                "Project ids or user ids are required".to_string(),
            ));
        }
        let projects = self.projects.get_all().await?;
        Ok(projects
            .into_iter()
            .filter(|p| filter.ids.is_empty() || filter.ids.contains(&p.id))
            .filter(|p| filter.user_ids.is_empty() || filter.user_ids.contains(&p.user_id))
            .filter(|p| filter.states_match(p))
            .collect())
    }

    /// Projects whose title contains `phrase`, ordered by title.
    pub async fn search_projects(&self, phrase: &str, filter: &ProjectFilter) -> Result<Vec<Project>> {
        if phrase.is_empty() {
            return Ok(Vec::new());
        }
        let phrase = phrase.to_lowercase();
        let mut projects: Vec<Project> = self
            .projects
            .get_all()
            .await?
            .into_iter()
            .filter(|p| p.title.to_lowercase().contains(&phrase))
            .filter(|p| filter.states_match(p))
            .collect();
        projects.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(projects)
    }

    pub async fn rewards_count(&self, project_ids: &[u32]) -> Result<BTreeMap<u32, usize>> {
        if project_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let rewards = self.rewards.get_all().await?;
        Ok(count_by(
            rewards.iter().map(|r| r.project_id),
            project_ids,
        ))
    }

    pub async fn transactions_count(&self, project_ids: &[u32]) -> Result<BTreeMap<u32, usize>> {
        if project_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let transactions = self.transactions.get_all().await?;
        Ok(count_by(
            transactions.iter().map(|t| t.project_id),
            project_ids,
        ))
    }

    /// Backers per project, counting completed and pending pledges.
    pub async fn funders_count(&self, project_ids: &[u32]) -> Result<BTreeMap<u32, usize>> {
        if project_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let transactions = self.transactions.get_all().await?;
        Ok(count_by(
            transactions
                .iter()
                .filter(|t| {
                    matches!(
                        t.txn_status,
                        TransactionStatus::Completed | TransactionStatus::Pending
                    )
                })
                .map(|t| t.project_id),
            project_ids,
        ))
    }

    /// Rewards of a project in display order.
    pub async fn rewards(&self, project_id: u32, published: Option<bool>) -> Result<Vec<Reward>> {
        if project_id == 0 {
            return Ok(Vec::new());
        }
        let mut rewards: Vec<Reward> = self
            .rewards
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.project_id == project_id)
            .filter(|r| published.is_none_or(|p| r.published == p))
            .collect();
        rewards.sort_by_key(|r| (r.ordering, r.id));
        Ok(rewards)
    }

    /// How many pledges claimed each reward.
    pub async fn reward_receivers(&self, reward_ids: &[u32]) -> Result<BTreeMap<u32, usize>> {
        if reward_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let transactions = self.transactions.get_all().await?;
        Ok(count_by(
            transactions.iter().filter_map(|t| t.reward_id),
            reward_ids,
        ))
    }

    /// Transactions by id (all when `ids` is empty), optionally by status.
    pub async fn transactions(
        &self,
        ids: &[u32],
        status: Option<&TransactionStatus>,
    ) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.get_all().await?;
        Ok(transactions
            .into_iter()
            .filter(|t| ids.is_empty() || ids.contains(&t.id))
            .filter(|t| status.is_none_or(|s| t.txn_status == *s))
            .collect())
    }

    pub async fn summaries(&self, today: NaiveDate) -> Result<Vec<ProjectSummary>> {
        let projects = self.projects.get_all().await?;
        let ids: Vec<u32> = projects.iter().map(|p| p.id).collect();
        let funders = self.funders_count(&ids).await?;
        Ok(projects
            .iter()
            .map(|p| ProjectSummary::of(p, funders.get(&p.id).copied().unwrap_or(0), today))
            .collect())
    }
}

/// Counts occurrences of each wanted key; wanted keys that never occur map to 0.
fn count_by(keys: impl Iterator<Item = u32>, wanted: &[u32]) -> BTreeMap<u32, usize> {
    let mut counts: BTreeMap<u32, usize> = wanted.iter().map(|id| (*id, 0)).collect();
    for key in keys {
        if let Some(count) = counts.get_mut(&key) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::project::tests::sample_project;
    use crate::domain::reward::tests::sample_reward;
    use crate::domain::transaction::RewardState;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_transaction(id: u32, status: TransactionStatus) -> Transaction {
        Transaction {
            id,
            txn_date: Utc::now(),
            txn_id: format!("TXN-{id}"),
            parent_txn_id: None,
            txn_amount: dec!(50),
            txn_currency: "USD".to_string(),
            txn_status: status,
            status_reason: String::new(),
            fee: Decimal::ZERO,
            extra_data: BTreeMap::new(),
            project_id: 1,
            reward_id: Some(7),
            investor_id: 5,
            receiver_id: 42,
            service_provider: "Manual".to_string(),
            service_alias: "manual".to_string(),
            reward_state: RewardState::NotSent,
        }
    }

    async fn seeded() -> Collections {
        let stores = Stores::in_memory();
        let mut second = sample_project();
        second.id = 2;
        second.title = "Beehive kit".to_string();
        second.user_id = 43;
        second.published = false;
        stores.projects.store(sample_project()).await.unwrap();
        stores.projects.store(second).await.unwrap();
        stores.rewards.store(sample_reward()).await.unwrap();
        stores
            .transactions
            .store(sample_transaction(1, TransactionStatus::Completed))
            .await
            .unwrap();
        stores
            .transactions
            .store(sample_transaction(2, TransactionStatus::Pending))
            .await
            .unwrap();
        stores
            .transactions
            .store(sample_transaction(3, TransactionStatus::Failed))
            .await
            .unwrap();
        Collections::new(&stores)
    }

    #[tokio::test]
    async fn test_projects_require_keys() {
        let collections = seeded().await;
        assert!(matches!(
            collections.projects(&ProjectFilter::default()).await,
            Err(CrowdfundingError::InvalidArgument(_))
        ));

        let filter = ProjectFilter {
            user_ids: vec![42, 43],
            published: Some(true),
            ..ProjectFilter::default()
        };
        let projects = collections.projects(&filter).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, 1);
    }

    #[tokio::test]
    async fn test_search_orders_by_title() {
        let collections = seeded().await;
        let found = collections
            .search_projects("K", &ProjectFilter::default())
            .await
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Beehive kit", "Solar kiln"]);
        assert!(collections
            .search_projects("", &ProjectFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_counts() {
        let collections = seeded().await;
        assert_eq!(
            collections.funders_count(&[1, 2]).await.unwrap(),
            BTreeMap::from([(1, 2), (2, 0)])
        );
        assert_eq!(
            collections.transactions_count(&[1]).await.unwrap(),
            BTreeMap::from([(1, 3)])
        );
        assert_eq!(
            collections.rewards_count(&[1, 2]).await.unwrap(),
            BTreeMap::from([(1, 1), (2, 0)])
        );
        assert_eq!(
            collections.reward_receivers(&[7]).await.unwrap(),
            BTreeMap::from([(7, 3)])
        );
    }

    #[tokio::test]
    async fn test_transactions_by_status() {
        let collections = seeded().await;
        let failed = collections
            .transactions(&[], Some(&TransactionStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, 3);
        assert_eq!(collections.transactions(&[1, 2], None).await.unwrap().len(), 2);
    }

    #[test]
    fn test_summary_state() {
        let mut project = sample_project();
        project.add_funds(dec!(300));
        let during = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        let summary = ProjectSummary::of(&project, 3, during);
        assert_eq!(summary.percent, dec!(150));
        assert_eq!(summary.progress_width, dec!(100));
        assert_eq!(summary.state, CampaignState::Active);

        let summary = ProjectSummary::of(&project, 3, after);
        assert_eq!(summary.state.as_str(), "successful");
    }
}
