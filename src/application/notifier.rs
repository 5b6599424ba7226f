use super::gateway::{
    AfterPayment, GatewayDispatcher, NotifyOutcome, RequestData, notify_context,
};
use super::routes::{self, BackingLayout};
use super::toolkit::GatewayToolkit;
use crate::domain::notification::MailMessage;
use crate::error::{CrowdfundingError, Result, SYSTEM_ERROR_MESSAGE};
use crate::interfaces::json::response::JsonResponse;
use serde_json::json;
use tracing::{info, warn};

pub const NOTIFIER_ERROR: &str = "CONTROLLER_NOTIFIER_ERROR";
pub const NOTIFIER_AJAX_ERROR: &str = "CONTROLLER_NOTIFIER_AJAX_ERROR";

const TITLE_SUCCESS: &str = "Success";
const TITLE_FAIL: &str = "Fail";
const PROCESSED: &str = "The transaction has been processed successfully.";
const NOT_PROCESSED: &str = "The transaction has not been processed successfully.";

/// Receives gateway callbacks and runs the payment pipeline.
///
/// Internal failures never reach the gateway: they are written to the activity
/// log and reported to the administrator by mail.
#[derive(Clone)]
pub struct Notifier {
    gateways: GatewayDispatcher,
    toolkit: GatewayToolkit,
}

/// The first outcome that recorded a transaction, or else the first outcome.
fn pick(outcomes: Vec<NotifyOutcome>) -> Option<NotifyOutcome> {
    let winner = outcomes.iter().position(|o| o.transaction.is_some());
    let mut outcomes = outcomes.into_iter();
    match winner {
        Some(index) => outcomes.nth(index),
        None => outcomes.next(),
    }
}

impl Notifier {
    pub fn new(gateways: GatewayDispatcher, toolkit: GatewayToolkit) -> Self {
        Self { gateways, toolkit }
    }

    /// Handles a server-to-server notification.
    ///
    /// Returns the acknowledgement to send back to the gateway, if any.
    pub async fn notify(&self, service: &str, request: &RequestData) -> Option<String> {
        if self.toolkit.params().payments_disabled {
            self.toolkit
                .log()
                .add(
                    &CrowdfundingError::PaymentDisabled.to_string(),
                    NOTIFIER_ERROR,
                    Some(json!({ "request": request })),
                )
                .await;
            return None;
        }

        let context = notify_context(service);
        let mut response = None;

        let result: Result<()> = async {
            let outcomes = self.gateways.payment_notify(&context, request).await?;
            let Some(outcome) = pick(outcomes) else {
                return Ok(());
            };
            let (Some(transaction), Some(project)) = (&outcome.transaction, &outcome.project)
            else {
                self.toolkit
                    .close_payment_session(outcome.payment_session.as_ref(), true)
                    .await?;
                return Ok(());
            };
            response = outcome.response.clone().filter(|r| !r.is_empty());

            info!("Notification for {context} recorded transaction {}", transaction.txn_id);
            let payment = AfterPayment {
                transaction,
                project,
                reward: outcome.reward.as_ref(),
                payment_session: outcome.payment_session.as_ref(),
            };
            self.gateways.after_payment(&context, &payment).await
        }
        .await;

        if let Err(err) = result {
            self.report(&format!("NOTIFIER ERROR: {err}"), NOTIFIER_ERROR, request)
                .await;
        }
        response
    }

    /// Handles a notification posted by the browser and answers with JSON.
    /// The payment session is always closed.
    pub async fn notify_ajax(&self, service: &str, request: &RequestData) -> JsonResponse {
        if self.toolkit.params().payments_disabled {
            let message = CrowdfundingError::PaymentDisabled.to_string();
            self.toolkit
                .log()
                .add(
                    &message,
                    NOTIFIER_AJAX_ERROR,
                    Some(json!({ "request": request })),
                )
                .await;
            return JsonResponse::failure(TITLE_FAIL, &message);
        }

        let context = notify_context(service);
        let mut session = None;

        let result: Result<JsonResponse> = async {
            let outcomes = self.gateways.payment_notify(&context, request).await?;
            let Some(outcome) = pick(outcomes) else {
                return Ok(JsonResponse::failure(TITLE_FAIL, NOT_PROCESSED));
            };
            session = outcome.payment_session.clone();

            let (Some(transaction), Some(project)) = (&outcome.transaction, &outcome.project)
            else {
                self.toolkit
                    .close_payment_session(session.as_ref(), true)
                    .await?;
                return Ok(JsonResponse::failure(TITLE_FAIL, NOT_PROCESSED));
            };

            let payment = AfterPayment {
                transaction,
                project,
                reward: outcome.reward.as_ref(),
                payment_session: session.as_ref(),
            };
            self.gateways.after_payment(&context, &payment).await?;
            self.toolkit
                .close_payment_session(session.as_ref(), true)
                .await?;

            let redirect_url = outcome.redirect_url.clone().unwrap_or_else(|| {
                routes::backing_url(self.toolkit.params(), project, BackingLayout::Share)
            });
            let message = outcome.message.as_deref().unwrap_or(PROCESSED);
            Ok(JsonResponse::success(TITLE_SUCCESS, message).with_redirect_url(redirect_url))
        }
        .await;

        match result {
            Ok(response) => response,
            Err(err) => {
                if let Err(e) = self
                    .toolkit
                    .close_payment_session(session.as_ref(), true)
                    .await
                {
                    warn!("Unable to close the payment session: {e}");
                }
                self.report(
                    &format!("AJAX NOTIFIER ERROR: {err}"),
                    NOTIFIER_AJAX_ERROR,
                    request,
                )
                .await;
                JsonResponse::failure(TITLE_FAIL, SYSTEM_ERROR_MESSAGE)
            }
        }
    }

    async fn report(&self, title: &str, r#type: &str, request: &RequestData) {
        self.toolkit
            .log()
            .add(title, r#type, Some(json!({ "input": request })))
            .await;
        if let Err(e) = self.mail_administrator().await {
            warn!("Unable to notify the administrator: {e}");
        }
    }

    async fn mail_administrator(&self) -> Result<()> {
        let params = self.toolkit.params();
        let recipient = self.toolkit.administrator().await?;
        let message = MailMessage {
            sender_name: params.sender_name.clone(),
            sender_email: params.sender_email.clone(),
            recipient_name: recipient.name,
            recipient_email: recipient.email,
            subject: format!("{}: payment notification error", params.site_name),
            body: format!(
                "A payment notification could not be processed. The details are in the {} table and in {}.",
                params.log_table, params.log_file
            ),
            mode: params.email_mode,
        };
        self.toolkit.stores().mailer.send(message).await
    }
}
