use crate::application::gateway::RequestData;
use crate::domain::transaction::TransactionStatus;
use crate::error::{CrowdfundingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A gateway notification.
    Notify,
    /// A status change made in the back office.
    Status,
}

/// One row of the replay file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Event {
    pub r#type: EventType,
    pub gateway: String,
    pub txn_id: String,
    pub project: Option<u32>,
    pub reward: Option<u32>,
    pub investor: Option<u32>,
    pub status: TransactionStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

impl Event {
    /// The notification fields a gateway would have posted.
    pub fn request(&self) -> RequestData {
        let mut request = RequestData::from([
            ("txn_id".to_string(), self.txn_id.clone()),
            ("status".to_string(), self.status.to_string()),
        ]);
        let optional = [
            ("project_id", self.project.map(|v| v.to_string())),
            ("reward_id", self.reward.map(|v| v.to_string())),
            ("investor_id", self.investor.map(|v| v.to_string())),
            ("amount", self.amount.map(|v| v.to_string())),
            ("currency", self.currency.clone()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                request.insert(key.to_string(), value);
            }
        }
        request
    }
}

/// Reads replayed gateway events from a CSV source.
///
/// Fields are trimmed and records may omit trailing columns.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes events, one `Result` per record.
    pub fn events(self) -> impl Iterator<Item = Result<Event>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CrowdfundingError::from))
    }
}
