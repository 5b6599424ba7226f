use super::gateway::{AfterPayment, RequestData, TRANSACTION_CONTEXTS};
use super::registry::CurrencyRegistry;
use super::routes::{self, BackingLayout};
use crate::config::ComponentParams;
use crate::domain::currency::{AmountFormatter, Currency};
use crate::domain::notification::{EmailTemplate, MailMessage, User};
use crate::domain::ports::Stores;
use crate::domain::project::{FundingType, Project};
use crate::domain::reward::Reward;
use crate::domain::session::{PaymentSession, SessionKeys};
use crate::domain::transaction::{FundsEffect, Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use crate::infrastructure::activity_log::ActivityLog;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Log type of entries written by payment gateways.
pub const PAYMENT_LOG_TYPE: &str = "DEBUG_PAYMENT_PLUGIN";

pub use crate::domain::transaction::ExtraData;

/// The reward a pledge asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardClaim {
    pub reward_id: u32,
    pub project_id: u32,
    pub txn_amount: Decimal,
}

/// Helpers shared by every gateway implementation.
#[derive(Clone)]
pub struct GatewayToolkit {
    stores: Stores,
    params: Arc<ComponentParams>,
    log: ActivityLog,
    currencies: CurrencyRegistry,
}

impl GatewayToolkit {
    pub fn new(stores: Stores, params: Arc<ComponentParams>) -> Self {
        let log = ActivityLog::new(stores.logs.clone());
        let currencies = CurrencyRegistry::new(stores.currencies.clone());
        Self {
            stores,
            params,
            log,
            currencies,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn params(&self) -> &ComponentParams {
        &self.params
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn currencies(&self) -> &CurrencyRegistry {
        &self.currencies
    }

    pub async fn project_currency(&self) -> Result<Currency> {
        self.currencies.get(self.params.project_currency).await
    }

    pub async fn formatter(&self) -> Result<AmountFormatter> {
        let currency = self.project_currency().await?;
        Ok(AmountFormatter::new(self.params.format.clone()).with_currency(currency))
    }

    /// Validates the claimed reward and takes one unit of it.
    ///
    /// Every rejection is written to the activity log before it is returned.
    pub async fn update_reward(&self, claim: &RewardClaim) -> Result<Reward> {
        let reward = self.check_reward(claim).await?;
        match self
            .stores
            .rewards
            .distribute(claim.reward_id, claim.project_id)
            .await
        {
            Ok(reward) => {
                debug!(
                    "Reward {} distributed {} times",
                    reward.id, reward.distributed
                );
                Ok(reward)
            }
            Err(err) => {
                if err.is_business_rule() {
                    self.reject_reward(&err, claim, Some(&reward)).await;
                }
                Err(err)
            }
        }
    }

    /// Validates the claimed reward without taking a unit of it.
    pub async fn check_reward(&self, claim: &RewardClaim) -> Result<Reward> {
        let reward = self
            .stores
            .rewards
            .get(claim.reward_id)
            .await?
            .filter(|r| r.project_id == claim.project_id);

        let Some(reward) = reward else {
            let err = CrowdfundingError::RewardNotFound {
                reward_id: claim.reward_id,
                project_id: claim.project_id,
            };
            self.reject_reward(&err, claim, None).await;
            return Err(err);
        };

        if claim.txn_amount < reward.amount {
            let err = CrowdfundingError::RewardAmountTooLow {
                amount: claim.txn_amount,
                required: reward.amount,
            };
            self.reject_reward(&err, claim, Some(&reward)).await;
            return Err(err);
        }

        if reward.available().is_exhausted() {
            let err = CrowdfundingError::RewardUnavailable(reward.id);
            self.reject_reward(&err, claim, Some(&reward)).await;
            return Err(err);
        }
        Ok(reward)
    }

    async fn reject_reward(&self, err: &CrowdfundingError, claim: &RewardClaim, reward: Option<&Reward>) {
        let data = json!({
            "data": {
                "reward_id": claim.reward_id,
                "project_id": claim.project_id,
                "txn_amount": claim.txn_amount,
            },
            "reward": reward,
        });
        self.log.add(&err.to_string(), PAYMENT_LOG_TYPE, Some(data)).await;
    }

    pub fn fee(&self, funding_type: FundingType, txn_amount: Decimal) -> Decimal {
        self.params.fees.calculate(funding_type, txn_amount)
    }

    /// Snapshot of the selected request fields under the current unix time.
    pub fn extra_data(request: &RequestData, keys: &[&str], note: &str, now: DateTime<Utc>) -> ExtraData {
        let mut snapshot: BTreeMap<String, String> = keys
            .iter()
            .filter_map(|key| request.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect();
        if !note.is_empty() {
            snapshot.insert("NOTE".to_string(), note.to_string());
        }
        BTreeMap::from([(now.timestamp().to_string(), snapshot)])
    }

    /// Absolute notification URL, prefixed with the site root unless it
    /// already names the site's host.
    pub fn callback_url(&self, html_encoded: bool) -> String {
        let mut page = self
            .params
            .callback_url
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();
        if html_encoded {
            page = page.replace('&', "&amp;");
        }
        let host = routes::host(&self.params.site_url);
        if page.contains(host) {
            page
        } else {
            format!("{}/{}", self.params.site_root(), page.trim_start_matches('/'))
        }
    }

    pub fn return_url(&self, project: &Project) -> String {
        self.configured_or(self.params.return_url.as_deref(), project, BackingLayout::Share)
    }

    pub fn cancel_url(&self, project: &Project) -> String {
        self.configured_or(self.params.cancel_url.as_deref(), project, BackingLayout::Default)
    }

    fn configured_or(&self, page: Option<&str>, project: &Project, layout: BackingLayout) -> String {
        match page.map(str::trim).filter(|p| !p.is_empty()) {
            Some(page) => page.to_string(),
            None => routes::backing_url(&self.params, project, layout),
        }
    }

    pub async fn payment_session(&self, keys: &SessionKeys) -> Result<Option<PaymentSession>> {
        self.stores.sessions.find(keys).await
    }

    /// Deletes the session record and, when asked, its intention.
    pub async fn close_payment_session(
        &self,
        session: Option<&PaymentSession>,
        remove_intention: bool,
    ) -> Result<()> {
        let Some(session) = session else {
            return Ok(());
        };
        if remove_intention && let Some(intention_id) = session.intention_id {
            self.stores.intentions.delete(intention_id).await?;
        }
        self.stores.sessions.delete(session.id).await?;
        debug!("Payment session {} closed", session.id);
        Ok(())
    }

    /// Applies the funds effect of a status change made by an administrator.
    pub async fn apply_status_change(
        &self,
        alias: &str,
        context: &str,
        transaction: &Transaction,
        old: &TransactionStatus,
        new: &TransactionStatus,
    ) -> Result<()> {
        if !TRANSACTION_CONTEXTS.contains(&context) || transaction.service_alias != alias {
            return Ok(());
        }
        let effect = FundsEffect::of(old, new);
        if effect == FundsEffect::None {
            return Ok(());
        }
        let project = self
            .stores
            .projects
            .adjust_funds(transaction.project_id, effect.delta(transaction.txn_amount))
            .await?;
        info!(
            "Transaction {} moved from {old} to {new}, project {} funded {}",
            transaction.id,
            project.id,
            project.funded.value()
        );
        Ok(())
    }

    /// Mails the administrator, the project owner and the backer, each when a
    /// template for them is configured. Delivery failures are logged only.
    pub async fn send_mails(&self, payment: &AfterPayment<'_>) -> Result<()> {
        let formatter = self.formatter().await?;
        let transaction = payment.transaction;

        let mut data = BTreeMap::from([
            ("site_name".to_string(), self.params.site_name.clone()),
            ("site_url".to_string(), format!("{}/", self.params.site_root())),
            ("item_title".to_string(), payment.project.title.clone()),
            (
                "item_url".to_string(),
                routes::details_url(&self.params, payment.project),
            ),
            (
                "amount".to_string(),
                formatter.format_currency(transaction.txn_amount),
            ),
            ("transaction_id".to_string(), transaction.txn_id.clone()),
            ("reward_title".to_string(), String::new()),
            ("delivery_date".to_string(), String::new()),
            ("payer_name".to_string(), String::new()),
            ("payer_email".to_string(), String::new()),
        ]);

        if let Some(reward) = payment.reward {
            data.insert("reward_title".to_string(), reward.title.clone());
            if let Some(delivery) = reward.delivery {
                data.insert(
                    "delivery_date".to_string(),
                    delivery.format("%d %B %Y").to_string(),
                );
            }
        }

        let investor = if transaction.investor_id > 0 {
            self.stores.users.get(transaction.investor_id).await?
        } else {
            None
        };
        if let Some(investor) = &investor {
            data.insert("payer_name".to_string(), investor.name.clone());
            data.insert("payer_email".to_string(), investor.email.clone());
        }

        let emails = &self.params.emails;
        if let Some(template) = &emails.admin {
            let recipient = self.administrator().await?;
            self.deliver(template, &recipient, &mut data, "administrator")
                .await;
        }

        if let Some(template) = &emails.creator {
            match self.stores.users.get(transaction.receiver_id).await? {
                Some(owner) => self.deliver(template, &owner, &mut data, "project owner").await,
                None => warn!("Project owner {} not found", transaction.receiver_id),
            }
        }

        if let (Some(template), Some(investor)) = (&emails.user, &investor) {
            self.deliver(template, investor, &mut data, "backer").await;
        }

        Ok(())
    }

    /// The configured administrator, or the site sender.
    pub async fn administrator(&self) -> Result<User> {
        if let Some(id) = self.params.administrator_id.filter(|id| *id > 0)
            && let Some(user) = self.stores.users.get(id).await?
        {
            return Ok(user);
        }
        Ok(User {
            id: 0,
            name: self.params.sender_name.clone(),
            email: self.params.sender_email.clone(),
        })
    }

    async fn deliver(
        &self,
        template: &EmailTemplate,
        recipient: &User,
        data: &mut BTreeMap<String, String>,
        audience: &str,
    ) {
        let sender_name = template
            .sender_name
            .clone()
            .unwrap_or_else(|| self.params.sender_name.clone());
        let sender_email = template
            .sender_email
            .clone()
            .unwrap_or_else(|| self.params.sender_email.clone());

        data.insert("sender_name".to_string(), sender_name.clone());
        data.insert("sender_email".to_string(), sender_email.clone());
        data.insert("recipient_name".to_string(), recipient.name.clone());
        data.insert("recipient_email".to_string(), recipient.email.clone());

        let (subject, body) = template.render(data);
        let message = MailMessage {
            sender_name,
            sender_email,
            recipient_name: recipient.name.clone(),
            recipient_email: recipient.email.clone(),
            subject,
            body,
            mode: self.params.email_mode,
        };

        if let Err(e) = self.stores.mailer.send(message).await {
            self.log
                .add(
                    &format!("Error sending mail to the {audience}"),
                    PAYMENT_LOG_TYPE,
                    Some(json!(e.to_string())),
                )
                .await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::collections::tests::sample_transaction;
    use crate::config::MailTemplates;
    use crate::domain::currency::SymbolPosition;
    use crate::domain::project::tests::sample_project;
    use crate::domain::ports::UserDirectory;
    use crate::domain::reward::tests::sample_reward;
    use crate::domain::session::Intention;
    use crate::infrastructure::in_memory::InMemoryUserDirectory;
    use crate::infrastructure::mailer::RecordingMailer;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    pub(crate) struct Fixture {
        pub toolkit: GatewayToolkit,
        pub mailer: RecordingMailer,
        pub users: InMemoryUserDirectory,
    }

    pub(crate) async fn fixture(params: ComponentParams) -> Fixture {
        let mailer = RecordingMailer::new();
        let users = InMemoryUserDirectory::new();
        let mut stores = Stores::in_memory();
        stores.mailer = Arc::new(mailer.clone());
        stores.users = Arc::new(users.clone());

        stores.projects.store(sample_project()).await.unwrap();
        stores.rewards.store(sample_reward()).await.unwrap();
        stores
            .currencies
            .store(Currency {
                id: 1,
                title: "US Dollar".to_string(),
                code: "USD".to_string(),
                symbol: "$".to_string(),
                position: SymbolPosition::Beginning,
            })
            .await
            .unwrap();
        for (id, name) in [(5, "Ada"), (42, "Grace"), (1, "Admin")] {
            users
                .insert(User {
                    id,
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_lowercase()),
                })
                .await;
        }

        Fixture {
            toolkit: GatewayToolkit::new(stores, Arc::new(params)),
            mailer,
            users,
        }
    }

    #[tokio::test]
    async fn test_update_reward_rejections_are_logged() {
        let f = fixture(ComponentParams::default()).await;
        let toolkit = &f.toolkit;

        let low = RewardClaim {
            reward_id: 7,
            project_id: 1,
            txn_amount: dec!(10),
        };
        assert!(matches!(
            toolkit.update_reward(&low).await,
            Err(CrowdfundingError::RewardAmountTooLow { .. })
        ));

        let wrong_project = RewardClaim {
            project_id: 2,
            txn_amount: dec!(30),
            ..low
        };
        assert!(matches!(
            toolkit.update_reward(&wrong_project).await,
            Err(CrowdfundingError::RewardNotFound { .. })
        ));

        let reward = toolkit.stores().rewards.get(7).await.unwrap().unwrap();
        assert_eq!(reward.distributed, 7);
        assert_eq!(toolkit.stores().logs.entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_reward_until_exhausted() {
        let f = fixture(ComponentParams::default()).await;
        let claim = RewardClaim {
            reward_id: 7,
            project_id: 1,
            txn_amount: dec!(25),
        };

        for expected in 8..=10 {
            let reward = f.toolkit.update_reward(&claim).await.unwrap();
            assert_eq!(reward.distributed, expected);
        }
        assert!(matches!(
            f.toolkit.update_reward(&claim).await,
            Err(CrowdfundingError::RewardUnavailable(7))
        ));
    }

    #[tokio::test]
    async fn test_check_reward_takes_no_unit() {
        let f = fixture(ComponentParams::default()).await;
        let claim = RewardClaim {
            reward_id: 7,
            project_id: 1,
            txn_amount: dec!(25),
        };

        let reward = f.toolkit.check_reward(&claim).await.unwrap();
        assert_eq!(reward.distributed, 7);
        let stored = f.toolkit.stores().rewards.get(7).await.unwrap().unwrap();
        assert_eq!(stored.distributed, 7);
    }

    #[test]
    fn test_extra_data_snapshot() {
        let request = RequestData::from([
            ("txn_id".to_string(), "T-1".to_string()),
            ("secret".to_string(), "hidden".to_string()),
        ]);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let extra = GatewayToolkit::extra_data(&request, &["txn_id", "status"], "manual entry", now);
        let snapshot = &extra["1700000000"];
        assert_eq!(snapshot.get("txn_id").unwrap(), "T-1");
        assert_eq!(snapshot.get("NOTE").unwrap(), "manual entry");
        assert!(!snapshot.contains_key("secret"));
    }

    #[tokio::test]
    async fn test_urls_prefer_configuration() {
        let params = ComponentParams {
            site_url: "https://fund.example.org".to_string(),
            callback_url: Some("index.php?option=notify&a=1".to_string()),
            return_url: Some(" https://elsewhere.example.com/thanks ".to_string()),
            ..ComponentParams::default()
        };
        let f = fixture(params).await;
        let project = sample_project();

        assert_eq!(
            f.toolkit.callback_url(true),
            "https://fund.example.org/index.php?option=notify&amp;a=1"
        );
        assert_eq!(f.toolkit.return_url(&project), "https://elsewhere.example.com/thanks");
        assert_eq!(
            f.toolkit.cancel_url(&project),
            "https://fund.example.org/projects/3/1:solar-kiln/backing?layout=default"
        );
    }

    #[tokio::test]
    async fn test_close_payment_session_removes_intention() {
        let f = fixture(ComponentParams::default()).await;
        let stores = f.toolkit.stores();
        let now = Utc::now();
        stores
            .intentions
            .store(Intention {
                id: 3,
                project_id: 1,
                reward_id: None,
                user_id: 5,
                record_date: now,
            })
            .await
            .unwrap();
        let session = PaymentSession {
            id: 4,
            session_id: "abc".to_string(),
            unique_key: None,
            project_id: 1,
            reward_id: None,
            user_id: 5,
            amount: dec!(30),
            gateway: "manual".to_string(),
            intention_id: Some(3),
            record_date: now,
        };
        stores.sessions.store(session.clone()).await.unwrap();

        let keys = SessionKeys::pick(None, Some("abc"), None).unwrap();
        let found = f.toolkit.payment_session(&keys).await.unwrap();
        assert_eq!(found.as_ref(), Some(&session));

        f.toolkit
            .close_payment_session(found.as_ref(), true)
            .await
            .unwrap();
        assert!(f.toolkit.payment_session(&keys).await.unwrap().is_none());
        assert!(stores.intentions.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_change_only_for_matching_alias_and_context() {
        let f = fixture(ComponentParams::default()).await;
        let tx = sample_transaction(1, TransactionStatus::Completed);
        let toolkit = &f.toolkit;

        toolkit
            .apply_status_change("paypal", TRANSACTION_CONTEXTS[0], &tx, &TransactionStatus::Pending, &TransactionStatus::Completed)
            .await
            .unwrap();
        toolkit
            .apply_status_change("manual", "crowdfunding.notify", &tx, &TransactionStatus::Pending, &TransactionStatus::Completed)
            .await
            .unwrap();
        let project = toolkit.stores().projects.get(1).await.unwrap().unwrap();
        assert_eq!(project.funded.value(), Decimal::ZERO);

        toolkit
            .apply_status_change("manual", TRANSACTION_CONTEXTS[0], &tx, &TransactionStatus::Pending, &TransactionStatus::Completed)
            .await
            .unwrap();
        toolkit
            .apply_status_change("manual", TRANSACTION_CONTEXTS[1], &tx, &TransactionStatus::Completed, &TransactionStatus::Refunded)
            .await
            .unwrap();
        toolkit
            .apply_status_change("manual", TRANSACTION_CONTEXTS[0], &tx, &TransactionStatus::Pending, &TransactionStatus::Completed)
            .await
            .unwrap();
        let project = toolkit.stores().projects.get(1).await.unwrap().unwrap();
        assert_eq!(project.funded.value(), dec!(50));
    }

    #[tokio::test]
    async fn test_send_mails_fills_templates() {
        let template = EmailTemplate {
            subject: "Pledge for {ITEM_TITLE}".to_string(),
            body: "{PAYER_NAME} pledged {AMOUNT} for {REWARD_TITLE}, dear {RECIPIENT_NAME}".to_string(),
            ..EmailTemplate::default()
        };
        let params = ComponentParams {
            administrator_id: Some(1),
            emails: MailTemplates {
                admin: Some(template.clone()),
                creator: Some(template.clone()),
                user: Some(template),
            },
            ..ComponentParams::default()
        };
        let f = fixture(params).await;
        let project = sample_project();
        let reward = sample_reward();
        let tx = sample_transaction(1, TransactionStatus::Completed);

        f.toolkit
            .send_mails(&AfterPayment {
                transaction: &tx,
                project: &project,
                reward: Some(&reward),
                payment_session: None,
            })
            .await
            .unwrap();

        let sent = f.mailer.sent().await;
        let recipients: Vec<&str> = sent.iter().map(|m| m.recipient_email.as_str()).collect();
        assert_eq!(
            recipients,
            ["admin@example.com", "grace@example.com", "ada@example.com"]
        );
        assert_eq!(sent[0].subject, "Pledge for Solar kiln");
        assert_eq!(
            sent[1].body,
            "Ada pledged $50.00 for Signed mug, dear Grace"
        );
    }

    #[tokio::test]
    async fn test_anonymous_backer_gets_no_mail() {
        let params = ComponentParams {
            emails: MailTemplates {
                user: Some(EmailTemplate::default()),
                ..MailTemplates::default()
            },
            ..ComponentParams::default()
        };
        let f = fixture(params).await;
        let project = sample_project();
        let mut tx = sample_transaction(1, TransactionStatus::Completed);
        tx.investor_id = 0;

        f.toolkit
            .send_mails(&AfterPayment {
                transaction: &tx,
                project: &project,
                reward: None,
                payment_session: None,
            })
            .await
            .unwrap();

        assert!(f.mailer.sent().await.is_empty());
        assert!(f.users.get(0).await.unwrap().is_none());
    }
}
