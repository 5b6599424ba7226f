//! Component parameters loaded from a JSON file.

use crate::domain::currency::FormatOptions;
use crate::domain::fees::FeeSchedule;
use crate::domain::notification::{EmailTemplate, MailMode};
use crate::error::{CrowdfundingError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Templates for the three notification mails sent after a payment.
/// A missing template means that mail is not sent.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct MailTemplates {
    pub admin: Option<EmailTemplate>,
    pub creator: Option<EmailTemplate>,
    pub user: Option<EmailTemplate>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct ComponentParams {
    /// Currency every project is priced in.
    pub project_currency: u32,
    pub format: FormatOptions,
    /// Turns off the payment pipeline without removing gateways.
    pub payments_disabled: bool,
    /// Receives the administrator mails; the site sender is used when unset.
    pub administrator_id: Option<u32>,
    pub site_name: String,
    pub site_url: String,
    pub sender_name: String,
    pub sender_email: String,
    pub email_mode: MailMode,
    pub emails: MailTemplates,
    pub fees: FeeSchedule,
    pub log_table: String,
    pub log_file: String,
    pub return_url: Option<String>,
    pub cancel_url: Option<String>,
    pub callback_url: Option<String>,
}

impl Default for ComponentParams {
    fn default() -> Self {
        Self {
            project_currency: 1,
            format: FormatOptions::default(),
            payments_disabled: false,
            administrator_id: None,
            site_name: "Crowdfunding".to_string(),
            site_url: "http://localhost".to_string(),
            sender_name: "Crowdfunding".to_string(),
            sender_email: "no-reply@localhost".to_string(),
            email_mode: MailMode::Html,
            emails: MailTemplates::default(),
            fees: FeeSchedule::default(),
            log_table: "crowdfunding_logs".to_string(),
            log_file: "crowdfunding-payments.log".to_string(),
            return_url: None,
            cancel_url: None,
            callback_url: None,
        }
    }
}

impl ComponentParams {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CrowdfundingError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text)?;
        if params.project_currency == 0 {
            return Err(CrowdfundingError::Config(
                "project_currency must be a currency id".to_string(),
            ));
        }
        Ok(params)
    }

    /// The site root without a trailing slash.
    pub fn site_root(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_fields_take_defaults() {
        let params = ComponentParams::from_json(r#"{ "payments_disabled": true }"#).unwrap();
        assert!(params.payments_disabled);
        assert_eq!(params.project_currency, 1);
        assert_eq!(params.format, FormatOptions::default());
        assert!(params.emails.admin.is_none());
    }

    #[test]
    fn test_nested_sections() {
        let params = ComponentParams::from_json(
            r#"{
                "site_url": "https://fund.example.org/",
                "fees": { "fixed_campaign_percent": "5" },
                "emails": { "user": { "subject": "Thanks", "body": "{AMOUNT}" } }
            }"#,
        )
        .unwrap();
        assert_eq!(params.fees.fixed_campaign_percent, dec!(5));
        assert_eq!(params.emails.user.as_ref().unwrap().subject, "Thanks");
        assert_eq!(params.site_root(), "https://fund.example.org");
    }

    #[test]
    fn test_zero_currency_rejected() {
        assert!(matches!(
            ComponentParams::from_json(r#"{ "project_currency": 0 }"#),
            Err(CrowdfundingError::Config(_))
        ));
    }
}
