//! The payment gateway seam: hooks every gateway implements, the dispatcher
//! that broadcasts them, and the context strings they are keyed by.

use super::toolkit::GatewayToolkit;
use crate::domain::project::Project;
use crate::domain::reward::Reward;
use crate::domain::session::PaymentSession;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::{CrowdfundingError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Raw request fields as posted by a gateway or the browser.
pub type RequestData = BTreeMap<String, String>;

pub const NOTIFY_CONTEXT: &str = "crowdfunding.notify";

/// Contexts in which a status change may move project funds.
pub const TRANSACTION_CONTEXTS: [&str; 2] =
    ["crowdfunding.transaction", "crowdfundingfinance.transaction"];

/// Keeps lowercase ASCII alphanumerics only.
pub fn clean_alias(service: &str) -> String {
    service
        .trim()
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// `crowdfunding.notify.<alias>`, or the bare prefix without a usable alias.
pub fn notify_context(service: &str) -> String {
    let alias = clean_alias(service);
    if alias.is_empty() {
        NOTIFY_CONTEXT.to_string()
    } else {
        format!("{NOTIFY_CONTEXT}.{alias}")
    }
}

pub fn payments_context(task: &str, service: &str) -> String {
    format!("crowdfunding.payments.{task}.{}", service.to_lowercase())
}

pub fn is_valid_payment_gateway(alias: &str, gateway: &str) -> bool {
    alias.to_lowercase() == gateway.to_lowercase()
}

/// What a gateway reports back after reading a notification.
///
/// An outcome without a transaction means the gateway recognised the request
/// but nothing was recorded.
#[derive(Debug, Clone, Default)]
pub struct NotifyOutcome {
    pub transaction: Option<Transaction>,
    pub project: Option<Project>,
    pub reward: Option<Reward>,
    pub payment_session: Option<PaymentSession>,
    /// Acknowledgement echoed back to the gateway.
    pub response: Option<String>,
    pub redirect_url: Option<String>,
    pub message: Option<String>,
}

/// Everything known about a completed notification.
#[derive(Debug, Clone, Copy)]
pub struct AfterPayment<'a> {
    pub transaction: &'a Transaction,
    pub project: &'a Project,
    pub reward: Option<&'a Reward>,
    pub payment_session: Option<&'a PaymentSession>,
}

/// Where to send the backer after a payments task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskOutcome {
    pub redirect_url: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTask {
    Checkout,
    DoCheckout,
    CompleteCheckout,
}

impl PaymentTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::DoCheckout => "docheckout",
            Self::CompleteCheckout => "completecheckout",
        }
    }
}

impl FromStr for PaymentTask {
    type Err = CrowdfundingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "checkout" => Ok(Self::Checkout),
            "docheckout" => Ok(Self::DoCheckout),
            "completecheckout" => Ok(Self::CompleteCheckout),
            other => Err(CrowdfundingError::InvalidArgument(format!(
                "Invalid task {other}"
            ))),
        }
    }
}

impl fmt::Display for PaymentTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pledge a payments task is about.
#[derive(Debug, Clone)]
pub struct PaymentItem {
    pub project: Project,
    pub reward: Option<Reward>,
    pub amount: Decimal,
    pub currency_code: String,
    pub user_id: u32,
    pub payment_session: Option<PaymentSession>,
    pub data: RequestData,
}

/// A payment gateway integration.
///
/// Every hook is broadcast to all registered gateways; each gateway decides
/// from the context string whether the call is meant for it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Lowercase identifier used in contexts and stored on transactions.
    fn alias(&self) -> &str;

    /// Human readable provider name.
    fn provider(&self) -> &str;

    fn toolkit(&self) -> &GatewayToolkit;

    async fn on_payment_notify(
        &self,
        context: &str,
        request: &RequestData,
    ) -> Result<Option<NotifyOutcome>>;

    /// Sends the notification mails when the notification was meant for
    /// this gateway.
    async fn on_after_payment(&self, context: &str, payment: &AfterPayment<'_>) -> Result<()> {
        if context != notify_context(self.alias()) {
            return Ok(());
        }
        self.toolkit().send_mails(payment).await
    }

    /// Moves project funds when an administrator changes a status.
    async fn on_transaction_change_state(
        &self,
        context: &str,
        transaction: &Transaction,
        old: &TransactionStatus,
        new: &TransactionStatus,
    ) -> Result<()> {
        self.toolkit()
            .apply_status_change(self.alias(), context, transaction, old, new)
            .await
    }

    async fn on_payments_authorize(
        &self,
        _context: &str,
        _item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        Ok(None)
    }

    async fn on_payments_task(
        &self,
        _context: &str,
        _task: PaymentTask,
        _item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        Ok(None)
    }
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// Broadcasts hooks to the registered gateways in registration order.
#[derive(Clone, Default)]
pub struct GatewayDispatcher {
    gateways: Vec<PaymentGatewayRef>,
}

impl GatewayDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: PaymentGatewayRef) {
        self.gateways.push(gateway);
    }

    pub fn find(&self, alias: &str) -> Option<&PaymentGatewayRef> {
        self.gateways
            .iter()
            .find(|g| is_valid_payment_gateway(g.alias(), alias))
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Collects every non-empty outcome in registration order.
    pub async fn payment_notify(
        &self,
        context: &str,
        request: &RequestData,
    ) -> Result<Vec<NotifyOutcome>> {
        let mut outcomes = Vec::new();
        for gateway in &self.gateways {
            if let Some(outcome) = gateway.on_payment_notify(context, request).await? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    pub async fn after_payment(&self, context: &str, payment: &AfterPayment<'_>) -> Result<()> {
        for gateway in &self.gateways {
            gateway.on_after_payment(context, payment).await?;
        }
        Ok(())
    }

    pub async fn transaction_change_state(
        &self,
        context: &str,
        transaction: &Transaction,
        old: &TransactionStatus,
        new: &TransactionStatus,
    ) -> Result<()> {
        for gateway in &self.gateways {
            gateway
                .on_transaction_change_state(context, transaction, old, new)
                .await?;
        }
        Ok(())
    }

    /// The first gateway that answers wins.
    pub async fn payments_authorize(
        &self,
        context: &str,
        item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        for gateway in &self.gateways {
            if let Some(outcome) = gateway.on_payments_authorize(context, item).await? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    pub async fn payments_task(
        &self,
        context: &str,
        task: PaymentTask,
        item: &PaymentItem,
    ) -> Result<Option<TaskOutcome>> {
        for gateway in &self.gateways {
            if let Some(outcome) = gateway.on_payments_task(context, task, item).await? {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_context() {
        assert_eq!(notify_context("PayPal"), "crowdfunding.notify.paypal");
        assert_eq!(notify_context(" pay-pal! "), "crowdfunding.notify.paypal");
        assert_eq!(notify_context(""), "crowdfunding.notify");
        assert_eq!(notify_context("--"), "crowdfunding.notify");
    }

    #[test]
    fn test_payments_context() {
        assert_eq!(
            payments_context(PaymentTask::DoCheckout.as_str(), "Manual"),
            "crowdfunding.payments.docheckout.manual"
        );
        assert_eq!(
            "completeCheckout".parse::<PaymentTask>().unwrap(),
            PaymentTask::CompleteCheckout
        );
        assert!("refund".parse::<PaymentTask>().is_err());
    }

    #[test]
    fn test_gateway_alias_comparison_ignores_case() {
        assert!(is_valid_payment_gateway("manual", "MANUAL"));
        assert!(!is_valid_payment_gateway("manual", "paypal"));
    }
}
