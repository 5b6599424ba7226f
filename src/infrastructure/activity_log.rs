use crate::domain::notification::LogEntry;
use crate::domain::ports::LogStoreRef;
use chrono::Utc;
use serde_json::Value;
use tracing::{error, warn};

/// Writes each entry to the log table and to the tracing output.
///
/// A failing table write is reported through tracing only; logging never
/// fails the caller.
#[derive(Clone)]
pub struct ActivityLog {
    store: LogStoreRef,
}

impl ActivityLog {
    pub fn new(store: LogStoreRef) -> Self {
        Self { store }
    }

    pub async fn add(&self, title: &str, r#type: &str, data: Option<Value>) {
        match &data {
            Some(data) => error!(kind = r#type, %data, "{title}"),
            None => error!(kind = r#type, "{title}"),
        }

        let entry = LogEntry {
            title: title.to_string(),
            r#type: r#type.to_string(),
            data,
            record_date: Utc::now(),
        };
        if let Err(e) = self.store.append(entry).await {
            warn!("Unable to write the log table: {e}");
        }
    }
}
