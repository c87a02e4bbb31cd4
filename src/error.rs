// ⚠️ Sentinel Errors
// Domain failures that callers must be able to tell apart

use thiserror::Error;

/// Errors raised by the scoring and masking core.
///
/// Storage, export and configuration plumbing report through `anyhow`
/// instead; only the failures a caller has to branch on live here.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A transaction record could not be evaluated (bad timestamp, missing field, negative amount)
    #[error("invalid transaction {id}: {reason}")]
    InvalidTransaction { id: String, reason: String },

    /// The rule registry failed its startup check
    #[error("rule configuration error: {0}")]
    RuleConfiguration(String),

    /// Two masking entries would corrupt each other on a round trip
    #[error("masking collision: {0}")]
    MaskingCollision(String),

    /// A masking matcher could not be compiled from the table
    #[error("failed to compile masking matcher: {0}")]
    Matcher(#[from] regex::Error),

    /// Text handed to the masker already carries a reserved placeholder
    #[error("text already contains reserved placeholder {token}")]
    ReservedToken { token: String },

    /// The caller's request is missing something the assistant needs
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The external text service failed or answered with something unusable
    #[error("assistant unavailable: {0}")]
    AssistantUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    /// Shorthand for an input error on a specific record
    pub fn invalid(id: &str, reason: impl Into<String>) -> Self {
        SentinelError::InvalidTransaction {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by a single bad record rather than configuration
    pub fn is_input_error(&self) -> bool {
        matches!(self, SentinelError::InvalidTransaction { .. })
    }
}

/// Result type for the scoring and masking core
pub type SentinelResult<T> = Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transaction_message() {
        let err = SentinelError::invalid("tx-1", "timestamp is empty");
        assert_eq!(err.to_string(), "invalid transaction tx-1: timestamp is empty");
        assert!(err.is_input_error());
    }

    #[test]
    fn test_configuration_errors_are_not_input_errors() {
        let err = SentinelError::MaskingCollision("Moscow".to_string());
        assert!(!err.is_input_error());
        assert!(err.to_string().starts_with("masking collision"));
    }
}
