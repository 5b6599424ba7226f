//! The backing wizard: choose an amount and a reward, confirm with a gateway,
//! then share.

use super::gateway::GatewayDispatcher;
use crate::domain::money::PledgeAmount;
use crate::domain::ports::Stores;
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::domain::session::{Intention, PaymentProcess, PaymentSession};
use crate::error::{CrowdfundingError, Result};
use chrono::{NaiveDate, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use tracing::{debug, info};

const SESSION_ID_LENGTH: usize = 32;

/// User-state key of the wizard for one user and project.
pub fn process_context(user_key: &str, project_id: u32) -> String {
    format!("payment_process.{user_key}.{project_id}")
}

fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Who is backing: the session key of the visitor and the user id, 0 when
/// anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backer {
    pub user_key: String,
    pub user_id: u32,
}

#[derive(Clone)]
pub struct PledgeWizard {
    stores: Stores,
    gateways: GatewayDispatcher,
}

impl PledgeWizard {
    pub fn new(stores: Stores, gateways: GatewayDispatcher) -> Self {
        Self { stores, gateways }
    }

    /// The current wizard state, fresh when nothing was chosen yet.
    pub async fn process(&self, backer: &Backer, project_id: u32) -> Result<PaymentProcess> {
        let context = process_context(&backer.user_key, project_id);
        Ok(self
            .stores
            .user_state
            .get(&context)
            .await?
            .unwrap_or_else(|| PaymentProcess::new(project_id)))
    }

    /// First step: records amount and reward.
    pub async fn select(
        &self,
        backer: &Backer,
        project_id: u32,
        amount: Decimal,
        reward_id: Option<u32>,
        today: NaiveDate,
    ) -> Result<PaymentProcess> {
        let project = self.open_project(project_id, today).await?;
        let amount = PledgeAmount::new(amount)?.value();
        if let Some(reward_id) = reward_id {
            let reward = self.reward(&project, reward_id).await?;
            if amount < reward.amount {
                return Err(CrowdfundingError::RewardAmountTooLow {
                    amount,
                    required: reward.amount,
                });
            }
        }

        let process = PaymentProcess {
            project_id,
            amount,
            reward_id,
            step1: true,
            step2: false,
            payment_service: String::new(),
        };
        self.stores
            .user_state
            .set(&process_context(&backer.user_key, project_id), process.clone())
            .await?;
        debug!("Backer {} selected {amount} for project {project_id}", backer.user_key);
        Ok(process)
    }

    /// Second step: the backer picks a gateway.
    ///
    /// Persists an intention and the payment session the gateway callback will
    /// be matched against.
    pub async fn confirm(
        &self,
        backer: &Backer,
        project_id: u32,
        payment_service: &str,
        today: NaiveDate,
    ) -> Result<PaymentSession> {
        let context = process_context(&backer.user_key, project_id);
        let mut process = self.process(backer, project_id).await?;
        if !process.step1 {
            return Err(CrowdfundingError::Validation(
                "Choose an amount and a reward first".to_string(),
            ));
        }

        let project = self.open_project(project_id, today).await?;
        if process.amount.is_zero() {
            return Err(CrowdfundingError::Validation(
                "The pledge amount is missing".to_string(),
            ));
        }
        if let Some(reward_id) = process.reward_id {
            let reward = self.reward(&project, reward_id).await?;
            if reward.available().is_exhausted() {
                return Err(CrowdfundingError::RewardUnavailable(reward_id));
            }
        }
        let gateway = self
            .gateways
            .find(payment_service)
            .ok_or_else(|| CrowdfundingError::InvalidPaymentGateway(payment_service.to_string()))?;

        let now = Utc::now();
        let intention = self
            .stores
            .intentions
            .insert(Intention {
                id: 0,
                project_id,
                reward_id: process.reward_id,
                user_id: backer.user_id,
                record_date: now,
            })
            .await?;

        let session = self
            .stores
            .sessions
            .insert(PaymentSession {
                id: 0,
                session_id: generate_session_id(),
                unique_key: None,
                project_id,
                reward_id: process.reward_id,
                user_id: backer.user_id,
                amount: process.amount,
                gateway: gateway.alias().to_string(),
                intention_id: Some(intention.id),
                record_date: now,
            })
            .await?;

        process.step2 = true;
        process.payment_service = gateway.alias().to_string();
        self.stores.user_state.set(&context, process).await?;
        info!(
            "Payment session {} opened for project {project_id} via {}",
            session.id, session.gateway
        );
        Ok(session)
    }

    /// Last step: forgets the wizard so the next pledge starts over.
    pub async fn reset(&self, backer: &Backer, project_id: u32) -> Result<()> {
        self.stores
            .user_state
            .clear(&process_context(&backer.user_key, project_id))
            .await
    }

    async fn open_project(&self, project_id: u32, today: NaiveDate) -> Result<Project> {
        let project = self
            .stores
            .projects
            .get(project_id)
            .await?
            .filter(|p| p.published && p.approved)
            .ok_or_else(|| CrowdfundingError::not_found("Project", project_id))?;
        if project.days_left(today) == Some(0) {
            return Err(CrowdfundingError::Validation(format!(
                "The campaign of project {project_id} has ended"
            )));
        }
        Ok(project)
    }

    async fn reward(&self, project: &Project, reward_id: u32) -> Result<Reward> {
        self.stores
            .rewards
            .get(reward_id)
            .await?
            .filter(|r| r.project_id == project.id)
            .ok_or(CrowdfundingError::RewardNotFound {
                reward_id,
                project_id: project.id,
            })
    }
}
