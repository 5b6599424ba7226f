use thiserror::Error;

/// Message shown to end users and gateways in place of internal failures.
pub const SYSTEM_ERROR_MESSAGE: &str = "A system error occurred";

#[derive(Error, Debug)]
pub enum CrowdfundingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid reward {reward_id} for project {project_id}")]
    RewardNotFound { reward_id: u32, project_id: u32 },
    #[error("Amount {amount} is lower than the reward amount {required}")]
    RewardAmountTooLow {
        amount: rust_decimal::Decimal,
        required: rust_decimal::Decimal,
    },
    #[error("Reward {0} is not available anymore")]
    RewardUnavailable(u32),
    #[error("Invalid payment gateway: {0}")]
    InvalidPaymentGateway(String),
    #[error("Payment functionality has been disabled")]
    PaymentDisabled,
    #[error("Invalid redirect URL")]
    InvalidRedirectUrl,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Transaction {txn_id} of {service_alias} is already recorded")]
    DuplicateTransaction {
        service_alias: String,
        txn_id: String,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

impl CrowdfundingError {
    /// Business-rule violations become notices for the user; everything else is
    /// a system failure that only the activity log may describe.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::Validation(_)
                | Self::NotFound { .. }
                | Self::RewardNotFound { .. }
                | Self::RewardAmountTooLow { .. }
                | Self::RewardUnavailable(_)
                | Self::InvalidPaymentGateway(_)
                | Self::PaymentDisabled
                | Self::InvalidRedirectUrl
                | Self::DuplicateTransaction { .. }
        )
    }

    /// The text that may be shown outside the process.
    pub fn public_message(&self) -> String {
        if self.is_business_rule() {
            self.to_string()
        } else {
            SYSTEM_ERROR_MESSAGE.to_string()
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CrowdfundingError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CrowdfundingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_errors_are_masked() {
        let err = CrowdfundingError::Storage(Box::new(std::io::Error::other("disk on fire")));
        assert!(!err.is_business_rule());
        assert_eq!(err.public_message(), SYSTEM_ERROR_MESSAGE);
    }

    #[test]
    fn test_business_errors_keep_their_message() {
        let err = CrowdfundingError::RewardUnavailable(7);
        assert!(err.is_business_rule());
        assert_eq!(err.public_message(), "Reward 7 is not available anymore");
    }

    #[test]
    fn test_duplicate_transaction_is_a_notice() {
        let err = CrowdfundingError::DuplicateTransaction {
            service_alias: "manual".to_string(),
            txn_id: "T1".to_string(),
        };
        assert!(err.is_business_rule());
        assert_eq!(err.public_message(), "Transaction T1 of manual is already recorded");
    }
}
