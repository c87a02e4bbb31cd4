// 💳 Transaction Model
// Raw feed records and their scored, immutable form

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::EvaluationResult;
use crate::error::{SentinelError, SentinelResult};

/// Timestamp layout used by the feed and the store
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single transaction as it arrives from the feed.
/// Immutable once scored; re-scoring produces a new `ScoredTransaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub timestamp: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub user_location: String,
    pub transaction_location: String,
}

impl Transaction {
    /// Check the record can be scored and return its parsed timestamp
    pub fn validate(&self) -> SentinelResult<NaiveDateTime> {
        if self.timestamp.trim().is_empty() {
            return Err(SentinelError::invalid(&self.id, "timestamp is empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(SentinelError::invalid(&self.id, "user_id is empty"));
        }
        if self.currency.trim().is_empty() {
            return Err(SentinelError::invalid(&self.id, "currency is empty"));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(SentinelError::invalid(
                &self.id,
                format!("amount must be a non-negative number, got {}", self.amount),
            ));
        }

        parse_timestamp(&self.timestamp).ok_or_else(|| {
            SentinelError::invalid(
                &self.id,
                format!("unparseable timestamp {:?}", self.timestamp),
            )
        })
    }

    /// Hash for duplicate suppression in the store
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}{}",
            self.id, self.timestamp, self.user_id, self.amount
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS`, falling back to RFC 3339
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// A transaction together with the result computed at ingestion time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTransaction {
    pub transaction: Transaction,
    pub result: EvaluationResult,
}

impl ScoredTransaction {
    pub fn is_flagged(&self) -> bool {
        self.result.is_flagged()
    }

    /// Flag names joined with ", ", or `None` when nothing fired
    pub fn flag_reason(&self) -> Option<String> {
        self.result.flag_reason()
    }

    pub fn anomaly_score(&self) -> u64 {
        self.result.score
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Helper to build a transaction with every field populated
    pub(crate) fn create_test_transaction(
        timestamp: &str,
        amount: f64,
        description: &str,
        user_location: &str,
        transaction_location: &str,
    ) -> Transaction {
        Transaction {
            id: "tx-test".to_string(),
            timestamp: timestamp.to_string(),
            user_id: "user123".to_string(),
            amount,
            currency: "USD".to_string(),
            description: description.to_string(),
            user_location: user_location.to_string(),
            transaction_location: transaction_location.to_string(),
        }
    }

    #[test]
    fn test_validate_returns_parsed_time() {
        let tx = create_test_transaction("2024-05-01 03:15:00", 50.0, "Coffee", "New York", "New York");
        let parsed = tx.validate().unwrap();
        assert_eq!(parsed.format(TIMESTAMP_FORMAT).to_string(), "2024-05-01 03:15:00");
    }

    #[test]
    fn test_rfc3339_fallback() {
        let tx = create_test_transaction("2024-05-01T03:15:00Z", 50.0, "Coffee", "London", "London");
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let tx = create_test_transaction("yesterday at noon", 50.0, "Coffee", "London", "London");
        let err = tx.validate().unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("unparseable timestamp"));
    }

    #[test]
    fn test_rejects_negative_amount() {
        let tx = create_test_transaction("2024-05-01 12:00:00", -0.01, "Refund", "London", "London");
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_user() {
        let mut tx = create_test_transaction("2024-05-01 12:00:00", 10.0, "Coffee", "London", "London");
        tx.user_id = String::new();
        let err = tx.validate().unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn test_missing_json_field_fails_to_deserialize() {
        let json = r#"{"id": "t1", "timestamp": "2024-05-01 12:00:00", "amount": 5.0}"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }

    #[test]
    fn test_idempotency_hash_is_stable() {
        let tx = create_test_transaction("2024-05-01 12:00:00", 10.0, "Coffee", "London", "London");
        let hash1 = tx.compute_idempotency_hash();
        let hash2 = tx.compute_idempotency_hash();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }
}
