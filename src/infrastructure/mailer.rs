use crate::domain::notification::MailMessage;
use crate::domain::ports::Mailer;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Writes every message to the tracing output instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        info!(
            to = %message.recipient_email,
            from = %message.sender_email,
            subject = %message.subject,
            "Mail sent"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory so callers can inspect them.
#[derive(Default, Clone)]
pub struct RecordingMailer {
    sent: Arc<RwLock<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.sent.write().await.push(message);
        Ok(())
    }
}
