use super::gateway::{
    NotifyOutcome, PaymentGateway, PaymentItem, PaymentTask, RequestData, TaskOutcome,
    notify_context, payments_context,
};
use super::toolkit::{GatewayToolkit, PAYMENT_LOG_TYPE, RewardClaim};
use crate::domain::money::PledgeAmount;
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::domain::session::{PaymentSession, SessionKeys};
use crate::domain::transaction::{
    FundsEffect, RewardState, Transaction, TransactionStatus,
};
use crate::error::{CrowdfundingError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use tracing::{info, warn};

pub const MANUAL_ALIAS: &str = "manual";

const EXTRA_DATA_KEYS: [&str; 7] = [
    "txn_id",
    "project_id",
    "reward_id",
    "amount",
    "currency",
    "status",
    "investor_id",
];

const PENDING_MESSAGE: &str = "Your pledge will be confirmed once the payment is received.";

/// Offline payments: bank transfers, cash, or notifications replayed from a file.
///
/// Notification fields: `txn_id`, `project_id`, `reward_id`, `amount`,
/// `currency`, `status`, `investor_id`, `session_id` and `note`.
pub struct ManualGateway {
    toolkit: GatewayToolkit,
}

impl ManualGateway {
    pub fn new(toolkit: GatewayToolkit) -> Self {
        Self { toolkit }
    }

    async fn record(
        &self,
        request: &RequestData,
        session: Option<&PaymentSession>,
    ) -> Result<NotifyOutcome> {
        let txn_id = field(request, "txn_id").ok_or_else(|| {
            CrowdfundingError::InvalidArgument("Missing transaction id".to_string())
        })?;
        let status = TransactionStatus::from(field(request, "status").unwrap_or("pending"));

        let existing = self
            .toolkit
            .stores()
            .transactions
            .find_by_txn_id(MANUAL_ALIAS, txn_id)
            .await?;

        let recorded = match existing {
            Some(tx) => self.change_status(tx, status, request).await?,
            None => match self.create(txn_id, status.clone(), request, session).await {
                // A concurrent notification recorded it first
                Err(CrowdfundingError::DuplicateTransaction { .. }) => {
                    match self
                        .toolkit
                        .stores()
                        .transactions
                        .find_by_txn_id(MANUAL_ALIAS, txn_id)
                        .await?
                    {
                        Some(tx) => self.change_status(tx, status, request).await?,
                        None => None,
                    }
                }
                recorded => recorded?,
            },
        };
        let Some((transaction, project, reward)) = recorded else {
            return Ok(NotifyOutcome {
                payment_session: session.cloned(),
                ..NotifyOutcome::default()
            });
        };

        self.toolkit.close_payment_session(session, true).await?;

        Ok(NotifyOutcome {
            redirect_url: Some(self.toolkit.return_url(&project)),
            transaction: Some(transaction),
            project: Some(project),
            reward,
            payment_session: session.cloned(),
            response: Some("OK".to_string()),
            message: None,
        })
    }

    async fn create(
        &self,
        txn_id: &str,
        status: TransactionStatus,
        request: &RequestData,
        session: Option<&PaymentSession>,
    ) -> Result<Option<(Transaction, Project, Option<Reward>)>> {
        let stores = self.toolkit.stores();

        let project_id = parse_id(request, "project_id")?
            .or(session.map(|s| s.project_id))
            .ok_or_else(|| CrowdfundingError::InvalidArgument("Missing project id".to_string()))?;
        let project = stores
            .projects
            .get(project_id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Project", project_id))?;

        let amount = match field(request, "amount") {
            Some(text) => Decimal::from_str(text).map_err(|e| {
                CrowdfundingError::Validation(format!("Invalid amount '{text}': {e}"))
            })?,
            None => session.map(|s| s.amount).unwrap_or_default(),
        };
        let amount = PledgeAmount::new(amount)?.value();

        let currency = self.toolkit.project_currency().await?;
        let txn_currency = field(request, "currency").unwrap_or(currency.code.as_str());
        if txn_currency != currency.code {
            return Err(CrowdfundingError::Validation(format!(
                "Currency {txn_currency} does not match the project currency {}",
                currency.code
            )));
        }

        let reward_id = parse_id(request, "reward_id")?.or(session.and_then(|s| s.reward_id));
        let counts = matches!(
            status,
            TransactionStatus::Completed | TransactionStatus::Pending
        );
        let claim = reward_id.filter(|_| counts).map(|reward_id| RewardClaim {
            reward_id,
            project_id,
            txn_amount: amount,
        });
        if let Some(claim) = &claim {
            self.toolkit.check_reward(claim).await?;
        }

        let now = Utc::now();
        let transaction = stores
            .transactions
            .insert(Transaction {
                id: 0,
                txn_date: now,
                txn_id: txn_id.to_string(),
                parent_txn_id: None,
                txn_amount: amount,
                txn_currency: txn_currency.to_string(),
                txn_status: status,
                status_reason: String::new(),
                fee: self.toolkit.fee(project.funding_type, amount),
                extra_data: GatewayToolkit::extra_data(
                    request,
                    &EXTRA_DATA_KEYS,
                    field(request, "note").unwrap_or_default(),
                    now,
                ),
                project_id,
                reward_id: claim.map(|c| c.reward_id),
                investor_id: parse_id(request, "investor_id")?
                    .or(session.map(|s| s.user_id))
                    .unwrap_or(0),
                receiver_id: project.user_id,
                service_provider: self.provider().to_string(),
                service_alias: MANUAL_ALIAS.to_string(),
                reward_state: RewardState::NotSent,
            })
            .await?;

        // The unit is taken after the pledge is recorded; the record is
        // dropped again when no unit is left.
        let reward = match claim {
            Some(claim) => match self.toolkit.update_reward(&claim).await {
                Ok(reward) => Some(reward),
                Err(err) => {
                    stores.transactions.delete(transaction.id).await?;
                    return Err(err);
                }
            },
            None => None,
        };
        info!(
            "Transaction {} recorded for project {project_id} with status {}",
            transaction.txn_id, transaction.txn_status
        );

        let effect = FundsEffect::of(&TransactionStatus::Pending, &transaction.txn_status);
        let project = self.apply(effect, &transaction, project).await?;
        Ok(Some((transaction, project, reward)))
    }

    async fn change_status(
        &self,
        existing: Transaction,
        status: TransactionStatus,
        request: &RequestData,
    ) -> Result<Option<(Transaction, Project, Option<Reward>)>> {
        let stores = self.toolkit.stores();
        let project = stores
            .projects
            .get(existing.project_id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Project", existing.project_id))?;

        let extra_data = GatewayToolkit::extra_data(
            request,
            &EXTRA_DATA_KEYS,
            field(request, "note").unwrap_or_default(),
            Utc::now(),
        );
        let (transaction, old) = stores
            .transactions
            .update_status(existing.id, status, extra_data)
            .await?;
        if old == transaction.txn_status {
            warn!(
                "Transaction {} already has status {old}",
                transaction.txn_id
            );
            return Ok(None);
        }
        info!(
            "Transaction {} moved from {old} to {}",
            transaction.txn_id, transaction.txn_status
        );

        let effect = FundsEffect::of(&old, &transaction.txn_status);
        let project = self.apply(effect, &transaction, project).await?;
        let reward = match transaction.reward_id {
            Some(id) => stores.rewards.get(id).await?,
            None => None,
        };
        Ok(Some((transaction, project, reward)))
    }

    async fn apply(&self, effect: FundsEffect, transaction: &Transaction, project: Project) -> Result<Project> {
        if effect == FundsEffect::None {
            return Ok(project);
        }
        self.toolkit
            .stores()
            .projects
            .adjust_funds(project.id, effect.delta(transaction.txn_amount))
            .await
    }

    fn pending_outcome(&self, item: &PaymentItem) -> TaskOutcome {
        TaskOutcome {
            redirect_url: Some(self.toolkit.return_url(&item.project)),
            message: Some(PENDING_MESSAGE.to_string()),
        }
    }
}

#[async_trait]
impl PaymentGateway for ManualGateway {
    fn alias(&self) -> &str {
        MANUAL_ALIAS
    }

    fn provider(&self) -> &str {
        "Manual"
    }

    fn toolkit(&self) -> &GatewayToolkit {
        &self.toolkit
    }

    async fn on_payment_notify(
        &self,
        context: &str,
        request: &RequestData,
    ) -> Result<Option<NotifyOutcome>> {
        if context != notify_context(MANUAL_ALIAS) {
            return Ok(None);
        }

        let session = match field(request, "session_id") {
            Some(session_id) => {
                let keys = SessionKeys::pick(None, Some(session_id), None)?;
                self.toolkit.payment_session(&keys).await?
            }
            None => None,
        };

        match self.record(request, session.as_ref()).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) if err.is_business_rule() => {
                let reward_rule = matches!(
                    err,
                    CrowdfundingError::RewardNotFound { .. }
                        | CrowdfundingError::RewardAmountTooLow { .. }
                        | CrowdfundingError::RewardUnavailable(_)
                );
                if !reward_rule {
                    self.toolkit
                        .log()
                        .add(&err.to_string(), PAYMENT_LOG_TYPE, Some(json!(request)))
                        .await;
                }
                Ok(Some(NotifyOutcome {
                    payment_session: session,
                    ..NotifyOutcome::default()
                }))
            }
            Err(err) => Err(err),
        }
    }

    async fn on_payments_authorize(
        &self,
        context: &str,
        item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        if context != payments_context("authorize", MANUAL_ALIAS) {
            return Ok(None);
        }
        Ok(Some(self.pending_outcome(item)))
    }

    async fn on_payments_task(
        &self,
        context: &str,
        task: PaymentTask,
        item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        if context != payments_context(task.as_str(), MANUAL_ALIAS) {
            return Ok(None);
        }
        Ok(Some(self.pending_outcome(item)))
    }
}

fn field<'a>(request: &'a RequestData, key: &str) -> Option<&'a str> {
    request
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// A positive id, `None` when the field is absent or zero.
fn parse_id(request: &RequestData, key: &str) -> Result<Option<u32>> {
    match field(request, key) {
        Some(text) => {
            let id: u32 = text.parse().map_err(|_| {
                CrowdfundingError::InvalidArgument(format!("Invalid {key} '{text}'"))
            })?;
            Ok(Some(id).filter(|id| *id > 0))
        }
        None => Ok(None),
    }
}
