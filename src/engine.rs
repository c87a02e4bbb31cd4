// 🚨 Rule Evaluation Engine
// Applies the rule set to one transaction: flags + aggregate score

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SentinelConfig;
use crate::error::SentinelResult;
use crate::rules::{Flag, RandomVelocitySignal, RuleInput, RuleSet};
use crate::transaction::{ScoredTransaction, Transaction};

// ============================================================================
// EVALUATION RESULT
// ============================================================================

/// Flags in rule order plus their summed weight. Computed once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub flags: Vec<Flag>,
    pub score: u64,
}

impl EvaluationResult {
    /// Any rule fired; there is no score threshold
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }

    pub fn flag_names(&self) -> Vec<&str> {
        self.flags.iter().map(|flag| flag.name.as_str()).collect()
    }

    pub fn flag_reason(&self) -> Option<String> {
        if self.flags.is_empty() {
            None
        } else {
            Some(self.flag_names().join(", "))
        }
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|flag| flag.name == name)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stateless apart from the optional randomness inside the velocity signal,
/// so one engine can be shared across threads.
pub struct RuleEvaluationEngine {
    rules: RuleSet,
}

impl RuleEvaluationEngine {
    /// Build an engine, running the rule set's startup check
    pub fn new(rules: RuleSet) -> SentinelResult<Self> {
        rules.validate()?;
        Ok(RuleEvaluationEngine { rules })
    }

    /// Standard rules over the configured catalogs with a random velocity signal
    pub fn from_config(config: &SentinelConfig) -> SentinelResult<Self> {
        let velocity = Arc::new(RandomVelocitySignal::new(config.velocity_probability));
        Self::new(RuleSet::standard(&config.catalogs, velocity))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Score one transaction. Fails only on malformed input.
    pub fn evaluate(&self, transaction: &Transaction) -> SentinelResult<EvaluationResult> {
        let timestamp = transaction.validate()?;
        let input = RuleInput {
            transaction,
            timestamp,
        };

        let flags: Vec<Flag> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(&input))
            .collect();
        let score = flags.iter().map(|flag| u64::from(flag.weight)).sum();

        tracing::debug!(
            transaction_id = %transaction.id,
            score,
            flags = ?flags.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            "transaction evaluated"
        );

        Ok(EvaluationResult { flags, score })
    }

    /// Score and wrap one transaction
    pub fn score(&self, transaction: Transaction) -> SentinelResult<ScoredTransaction> {
        let result = self.evaluate(&transaction)?;
        Ok(ScoredTransaction {
            transaction,
            result,
        })
    }

    /// Score a batch; a bad record only fails its own slot
    pub fn evaluate_batch(
        &self,
        transactions: &[Transaction],
    ) -> Vec<SentinelResult<ScoredTransaction>> {
        transactions
            .iter()
            .map(|tx| {
                let scored = self.score(tx.clone());
                if let Err(e) = &scored {
                    tracing::warn!(transaction_id = %tx.id, error = %e, "transaction rejected");
                }
                scored
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Catalogs;
    use crate::error::SentinelError;
    use crate::rules::{
        FixedVelocitySignal, Rule, GEOLOCATION_MISMATCH, HIGH_AMOUNT, HIGH_VELOCITY,
        RISKY_GEOLOCATION, SANCTIONED_ENTITY, UNUSUAL_HOURS,
    };
    use crate::transaction::tests::create_test_transaction;

    fn engine(velocity: bool) -> RuleEvaluationEngine {
        let rules = RuleSet::standard(&Catalogs::default(), Arc::new(FixedVelocitySignal(velocity)));
        RuleEvaluationEngine::new(rules).unwrap()
    }

    #[test]
    fn test_quiet_transaction_is_not_flagged() {
        let tx = create_test_transaction("2024-05-01 14:00:00", 42.0, "Payment to GoodCorp", "London", "London");
        let result = engine(false).evaluate(&tx).unwrap();

        assert!(!result.is_flagged());
        assert_eq!(result.score, 0);
        assert_eq!(result.flag_reason(), None);
    }

    #[test]
    fn test_sanctioned_and_high_amount() {
        let tx = create_test_transaction(
            "2024-05-01 14:00:00",
            15_000.0,
            "Payment to High-Risk Corp Beta from user123",
            "New York",
            "New York",
        );
        let result = engine(false).evaluate(&tx).unwrap();

        assert_eq!(result.flag_names(), vec![SANCTIONED_ENTITY, HIGH_AMOUNT]);
        assert_eq!(result.score, 130);
        assert_eq!(result.flag_reason().as_deref(), Some("Sanctioned Entity, High Amount"));
    }

    #[test]
    fn test_every_rule_fires_in_definition_order() {
        let tx = create_test_transaction(
            "2024-05-01 02:30:00",
            20_000.0,
            "Payment to Watchlist Inc. Gamma from user123",
            "New York",
            "Moscow",
        );
        let result = engine(true).evaluate(&tx).unwrap();

        assert_eq!(
            result.flag_names(),
            vec![
                UNUSUAL_HOURS,
                GEOLOCATION_MISMATCH,
                SANCTIONED_ENTITY,
                HIGH_AMOUNT,
                HIGH_VELOCITY,
                RISKY_GEOLOCATION
            ]
        );
        assert_eq!(result.score, 25 + 40 + 100 + 30 + 50 + 60);
    }

    #[test]
    fn test_single_low_weight_rule_still_flags() {
        let tx = create_test_transaction("2024-05-01 04:00:00", 5.0, "Coffee", "Tokyo", "Tokyo");
        let result = engine(false).evaluate(&tx).unwrap();

        assert!(result.is_flagged());
        assert_eq!(result.score, 25);
    }

    #[test]
    fn test_moscow_always_risky() {
        let tx = create_test_transaction("2024-05-01 14:00:00", 5.0, "Coffee", "Moscow", "Moscow");
        let result = engine(false).evaluate(&tx).unwrap();

        assert!(result.has_flag(RISKY_GEOLOCATION));
        assert_eq!(result.score, 60);
    }

    #[test]
    fn test_malformed_timestamp_is_input_error() {
        let tx = create_test_transaction("not a time", 5.0, "Coffee", "Tokyo", "Tokyo");
        let err = engine(false).evaluate(&tx).unwrap_err();
        assert!(matches!(err, SentinelError::InvalidTransaction { .. }));
    }

    #[test]
    fn test_batch_isolates_bad_records() {
        let good = create_test_transaction("2024-05-01 14:00:00", 5.0, "Coffee", "Tokyo", "Beijing");
        let bad = create_test_transaction("", 5.0, "Coffee", "Tokyo", "Tokyo");

        let results = engine(false).evaluate_batch(&[good.clone(), bad, good]);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().anomaly_score(), 40);
    }

    #[test]
    fn test_appended_rule_runs_last() {
        struct WeekendRule;

        impl Rule for WeekendRule {
            fn name(&self) -> &str {
                "Weekend"
            }
            fn weight(&self) -> u32 {
                5
            }
            fn matches(&self, input: &RuleInput<'_>) -> bool {
                use chrono::Datelike;
                input.timestamp.weekday().number_from_monday() >= 6
            }
        }

        let rules = RuleSet::standard(&Catalogs::default(), Arc::new(FixedVelocitySignal(false)))
            .with_rule(WeekendRule);
        let engine = RuleEvaluationEngine::new(rules).unwrap();

        // 2024-05-04 is a Saturday
        let tx = create_test_transaction("2024-05-04 14:00:00", 5.0, "Coffee", "Tokyo", "Beijing");
        let result = engine.evaluate(&tx).unwrap();

        assert_eq!(result.flag_names(), vec![GEOLOCATION_MISMATCH, "Weekend"]);
        assert_eq!(result.score, 45);
    }

    #[test]
    fn test_engine_rejects_invalid_rule_set() {
        assert!(RuleEvaluationEngine::new(RuleSet::new()).is_err());
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        let engine = Arc::new(engine(false));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let tx = create_test_transaction(
                        "2024-05-01 14:00:00",
                        10_000.0 + f64::from(i),
                        "Coffee",
                        "Tokyo",
                        "Tokyo",
                    );
                    engine.evaluate(&tx).unwrap().score
                })
            })
            .collect();

        let scores: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(scores, vec![0, 30, 30, 30]);
    }
}
