use super::gateway::{GatewayDispatcher, PaymentItem, PaymentTask, RequestData, payments_context};
use super::pledge::{Backer, process_context};
use super::toolkit::GatewayToolkit;
use crate::domain::session::SessionKeys;
use crate::error::{CrowdfundingError, Result};
use serde_json::json;
use tracing::debug;

pub const PAYMENTS_ERROR: &str = "CONTROLLER_PAYMENTS_DOCHECKOUT_ERROR";

/// What the browser posts to start or continue a payment.
#[derive(Debug, Clone, Default)]
pub struct PaymentRequest {
    pub project_id: u32,
    /// Overrides the gateway remembered by the wizard.
    pub payment_service: Option<String>,
    pub session_id: Option<String>,
    pub data: RequestData,
}

/// Where the browser goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    pub message: Option<String>,
}

/// Hands a confirmed pledge to its gateway.
#[derive(Clone)]
pub struct Payments {
    gateways: GatewayDispatcher,
    toolkit: GatewayToolkit,
}

enum Step {
    Authorize,
    Task(PaymentTask),
}

impl Payments {
    pub fn new(gateways: GatewayDispatcher, toolkit: GatewayToolkit) -> Self {
        Self { gateways, toolkit }
    }

    pub async fn authorize(&self, backer: &Backer, request: &PaymentRequest) -> Result<Redirect> {
        self.run(backer, request, Step::Authorize).await
    }

    /// Runs `checkout`, `doCheckout` or `completeCheckout`.
    pub async fn process(
        &self,
        backer: &Backer,
        request: &PaymentRequest,
        task: PaymentTask,
    ) -> Result<Redirect> {
        self.run(backer, request, Step::Task(task)).await
    }

    /// Business errors reach the caller unchanged. System failures are logged
    /// first; callers show them through `CrowdfundingError::public_message`.
    async fn run(&self, backer: &Backer, request: &PaymentRequest, step: Step) -> Result<Redirect> {
        if self.toolkit.params().payments_disabled {
            return Err(CrowdfundingError::PaymentDisabled);
        }
        match self.dispatch(backer, request, step).await {
            Err(err) if !err.is_business_rule() => {
                self.toolkit
                    .log()
                    .add(
                        &err.to_string(),
                        PAYMENTS_ERROR,
                        Some(json!({
                            "project_id": request.project_id,
                            "input": request.data,
                        })),
                    )
                    .await;
                Err(err)
            }
            result => result,
        }
    }

    async fn dispatch(&self, backer: &Backer, request: &PaymentRequest, step: Step) -> Result<Redirect> {
        let stores = self.toolkit.stores();
        let context_key = process_context(&backer.user_key, request.project_id);
        let mut process = stores
            .user_state
            .get(&context_key)
            .await?
            .unwrap_or_default();

        let service = request
            .payment_service
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(process.payment_service.as_str())
            .to_lowercase();
        if service.is_empty() {
            return Err(CrowdfundingError::InvalidPaymentGateway(service));
        }
        process.payment_service = service.clone();
        stores.user_state.set(&context_key, process.clone()).await?;

        let project = stores
            .projects
            .get(request.project_id)
            .await?
            .ok_or_else(|| CrowdfundingError::not_found("Project", request.project_id))?;
        let reward = match process.reward_id {
            Some(id) => stores.rewards.get(id).await?,
            None => None,
        };
        let payment_session = match request.session_id.as_deref() {
            Some(session_id) => {
                let keys = SessionKeys::pick(None, Some(session_id), None)?;
                self.toolkit.payment_session(&keys).await?
            }
            None => None,
        };
        let currency = self.toolkit.project_currency().await?;

        let item = PaymentItem {
            project,
            reward,
            amount: process.amount,
            currency_code: currency.code,
            user_id: backer.user_id,
            payment_session,
            data: request.data.clone(),
        };

        let outcome = match step {
            Step::Authorize => {
                let context = payments_context("authorize", &service);
                debug!("Dispatching {context}");
                self.gateways.payments_authorize(&context, &item).await?
            }
            Step::Task(task) => {
                let context = payments_context(task.as_str(), &service);
                debug!("Dispatching {context}");
                self.gateways.payments_task(&context, task, &item).await?
            }
        };

        let outcome = outcome.unwrap_or_default();
        let url = outcome
            .redirect_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(CrowdfundingError::InvalidRedirectUrl)?;
        Ok(Redirect {
            url,
            message: outcome.message,
        })
    }
}
