use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entry of the activity log table.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LogEntry {
    pub title: String,
    /// Category such as `CONTROLLER_NOTIFIER_ERROR`.
    pub r#type: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    pub record_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailMode {
    #[default]
    Plain,
    Html,
}

/// Subject and body with `{PLACEHOLDER}` markers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
}

impl EmailTemplate {
    /// Replaces `{KEY}` markers, keys are matched upper-cased.
    pub fn render(&self, data: &BTreeMap<String, String>) -> (String, String) {
        let mut subject = self.subject.clone();
        let mut body = self.body.clone();
        for (key, value) in data {
            let marker = format!("{{{}}}", key.to_uppercase());
            subject = subject.replace(&marker, value);
            body = body.replace(&marker, value);
        }
        (subject, body)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MailMessage {
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub mode: MailMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_markers() {
        let template = EmailTemplate {
            subject: "New pledge for {ITEM_TITLE}".to_string(),
            body: "{PAYER_NAME} pledged {AMOUNT}. {UNKNOWN}".to_string(),
            ..EmailTemplate::default()
        };
        let data = BTreeMap::from([
            ("item_title".to_string(), "Solar kiln".to_string()),
            ("payer_name".to_string(), "Ada".to_string()),
            ("amount".to_string(), "$50.00".to_string()),
        ]);

        let (subject, body) = template.render(&data);
        assert_eq!(subject, "New pledge for Solar kiln");
        assert_eq!(body, "Ada pledged $50.00. {UNKNOWN}");
    }
}
