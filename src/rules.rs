// 🏷️ Scoring Rules - Rules as Data
// Independent predicates, each contributing one weighted flag

use chrono::{NaiveDateTime, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Catalogs;
use crate::error::{SentinelError, SentinelResult};
use crate::transaction::Transaction;

pub const UNUSUAL_HOURS: &str = "Unusual Hours";
pub const GEOLOCATION_MISMATCH: &str = "Geolocation Mismatch";
pub const SANCTIONED_ENTITY: &str = "Sanctioned Entity";
pub const HIGH_AMOUNT: &str = "High Amount";
pub const HIGH_VELOCITY: &str = "High Velocity";
pub const RISKY_GEOLOCATION: &str = "Risky Geolocation";

/// Amounts strictly above this trip the high amount rule (not currency-aware)
pub const HIGH_AMOUNT_THRESHOLD: f64 = 10_000.0;

// 01:00:00 and 05:00:00 as seconds from midnight, both inclusive
const UNUSUAL_HOURS_START: u32 = 3_600;
const UNUSUAL_HOURS_END: u32 = 18_000;

// ============================================================================
// FLAG
// ============================================================================

/// One triggered rule and the points it contributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub weight: u32,
}

impl Flag {
    pub fn new(name: &str, weight: u32) -> Self {
        Flag {
            name: name.to_string(),
            weight,
        }
    }
}

// ============================================================================
// RULE TRAIT
// ============================================================================

/// What a rule sees: the record plus its already-validated timestamp
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub transaction: &'a Transaction,
    pub timestamp: NaiveDateTime,
}

/// A stateless scoring predicate.
///
/// New rules are added by implementing this trait and appending to a
/// [`RuleSet`]; the engine never needs to change.
pub trait Rule: Send + Sync {
    /// Human-readable flag label
    fn name(&self) -> &str;

    /// Points added to the score when the rule fires
    fn weight(&self) -> u32;

    /// Does the transaction trip this rule?
    fn matches(&self, input: &RuleInput<'_>) -> bool;

    /// Catalog literals the rule depends on (checked once at startup)
    fn catalog(&self) -> &[String] {
        &[]
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Flag> {
        if self.matches(input) {
            Some(Flag::new(self.name(), self.weight()))
        } else {
            None
        }
    }
}

// ============================================================================
// BUILT-IN RULES
// ============================================================================

/// Time of day within [01:00:00, 05:00:00]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnusualHoursRule;

impl Rule for UnusualHoursRule {
    fn name(&self) -> &str {
        UNUSUAL_HOURS
    }

    fn weight(&self) -> u32 {
        25
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        let time = input.timestamp.time();
        let secs = time.num_seconds_from_midnight();

        // 05:00:00.250 is already past the window
        secs >= UNUSUAL_HOURS_START
            && (secs < UNUSUAL_HOURS_END || (secs == UNUSUAL_HOURS_END && time.nanosecond() == 0))
    }
}

/// Registered location differs from where the transaction happened
#[derive(Debug, Default, Clone, Copy)]
pub struct GeolocationMismatchRule;

impl Rule for GeolocationMismatchRule {
    fn name(&self) -> &str {
        GEOLOCATION_MISMATCH
    }

    fn weight(&self) -> u32 {
        40
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        input.transaction.user_location != input.transaction.transaction_location
    }
}

/// Description mentions a sanctioned entity (case-sensitive substring)
#[derive(Debug, Clone)]
pub struct SanctionedEntityRule {
    entities: Vec<String>,
}

impl SanctionedEntityRule {
    pub fn new(entities: Vec<String>) -> Self {
        SanctionedEntityRule { entities }
    }
}

impl Rule for SanctionedEntityRule {
    fn name(&self) -> &str {
        SANCTIONED_ENTITY
    }

    fn weight(&self) -> u32 {
        100
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        self.entities
            .iter()
            .any(|entity| input.transaction.description.contains(entity.as_str()))
    }

    fn catalog(&self) -> &[String] {
        &self.entities
    }
}

/// Amount strictly greater than the threshold
#[derive(Debug, Clone, Copy)]
pub struct HighAmountRule {
    threshold: f64,
}

impl HighAmountRule {
    pub fn new(threshold: f64) -> Self {
        HighAmountRule { threshold }
    }
}

impl Default for HighAmountRule {
    fn default() -> Self {
        Self::new(HIGH_AMOUNT_THRESHOLD)
    }
}

impl Rule for HighAmountRule {
    fn name(&self) -> &str {
        HIGH_AMOUNT
    }

    fn weight(&self) -> u32 {
        30
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        input.transaction.amount > self.threshold
    }
}

/// Stand-in for an upstream velocity detector; see [`VelocitySignal`]
#[derive(Clone)]
pub struct HighVelocityRule {
    signal: Arc<dyn VelocitySignal>,
}

impl HighVelocityRule {
    pub fn new(signal: Arc<dyn VelocitySignal>) -> Self {
        HighVelocityRule { signal }
    }
}

impl Rule for HighVelocityRule {
    fn name(&self) -> &str {
        HIGH_VELOCITY
    }

    fn weight(&self) -> u32 {
        50
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        self.signal.is_high_velocity(input.transaction)
    }
}

/// Transaction occurred in a high-risk location (exact match)
#[derive(Debug, Clone)]
pub struct RiskyGeolocationRule {
    locations: Vec<String>,
}

impl RiskyGeolocationRule {
    pub fn new(locations: Vec<String>) -> Self {
        RiskyGeolocationRule { locations }
    }
}

impl Rule for RiskyGeolocationRule {
    fn name(&self) -> &str {
        RISKY_GEOLOCATION
    }

    fn weight(&self) -> u32 {
        60
    }

    fn matches(&self, input: &RuleInput<'_>) -> bool {
        self.locations
            .iter()
            .any(|location| *location == input.transaction.transaction_location)
    }

    fn catalog(&self) -> &[String] {
        &self.locations
    }
}

// ============================================================================
// VELOCITY SIGNAL
// ============================================================================

/// Source of the velocity verdict. The random implementation simulates an
/// upstream detector that does not exist yet; tests inject a fixed one.
pub trait VelocitySignal: Send + Sync {
    fn is_high_velocity(&self, transaction: &Transaction) -> bool;
}

/// Fires with the given probability on every call
#[derive(Debug, Clone, Copy)]
pub struct RandomVelocitySignal {
    probability: f64,
}

impl RandomVelocitySignal {
    pub fn new(probability: f64) -> Self {
        RandomVelocitySignal {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl VelocitySignal for RandomVelocitySignal {
    fn is_high_velocity(&self, _transaction: &Transaction) -> bool {
        rand::thread_rng().gen::<f64>() < self.probability
    }
}

/// Always answers the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedVelocitySignal(pub bool);

impl VelocitySignal for FixedVelocitySignal {
    fn is_high_velocity(&self, _transaction: &Transaction) -> bool {
        self.0
    }
}

// ============================================================================
// RULE SET
// ============================================================================

/// Ordered rule registry. Evaluation order is insertion order.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new() }
    }

    /// The six standard rules in their fixed order
    pub fn standard(catalogs: &Catalogs, velocity: Arc<dyn VelocitySignal>) -> Self {
        RuleSet::new()
            .with_rule(UnusualHoursRule)
            .with_rule(GeolocationMismatchRule)
            .with_rule(SanctionedEntityRule::new(catalogs.sanctioned_entities.clone()))
            .with_rule(HighAmountRule::default())
            .with_rule(HighVelocityRule::new(velocity))
            .with_rule(RiskyGeolocationRule::new(catalogs.high_risk_locations.clone()))
    }

    /// Append a rule (builder style)
    pub fn with_rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.push(Box::new(rule));
        self
    }

    /// Append a rule
    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Startup check: misconfiguration is caught here, never per transaction
    pub fn validate(&self) -> SentinelResult<()> {
        if self.rules.is_empty() {
            return Err(SentinelError::RuleConfiguration(
                "rule set is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.name().trim().is_empty() {
                return Err(SentinelError::RuleConfiguration(
                    "rule with an empty name".to_string(),
                ));
            }
            if !seen.insert(rule.name()) {
                return Err(SentinelError::RuleConfiguration(format!(
                    "duplicate rule name {:?}",
                    rule.name()
                )));
            }
            if rule.catalog().iter().any(|literal| literal.trim().is_empty()) {
                return Err(SentinelError::RuleConfiguration(format!(
                    "rule {:?} has an empty catalog entry",
                    rule.name()
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::create_test_transaction;

    fn check<R: Rule>(rule: &R, tx: &Transaction) -> Option<Flag> {
        let timestamp = tx.validate().unwrap();
        rule.evaluate(&RuleInput {
            transaction: tx,
            timestamp,
        })
    }

    fn at(time: &str) -> Transaction {
        create_test_transaction(&format!("2024-05-01 {}", time), 10.0, "Coffee", "London", "London")
    }

    #[test]
    fn test_unusual_hours_window_is_inclusive() {
        let rule = UnusualHoursRule;

        assert_eq!(check(&rule, &at("01:00:00")), Some(Flag::new(UNUSUAL_HOURS, 25)));
        assert!(check(&rule, &at("03:30:00")).is_some());
        assert!(check(&rule, &at("05:00:00")).is_some());
        assert!(check(&rule, &at("00:59:59")).is_none());
        assert!(check(&rule, &at("05:00:01")).is_none());
        assert!(check(&rule, &at("13:00:00")).is_none());
    }

    #[test]
    fn test_unusual_hours_fraction_past_end() {
        let tx = create_test_transaction(
            "2024-05-01T05:00:00.250Z",
            10.0,
            "Coffee",
            "London",
            "London",
        );
        assert!(check(&UnusualHoursRule, &tx).is_none());
    }

    #[test]
    fn test_geolocation_mismatch() {
        let rule = GeolocationMismatchRule;
        let mismatch = create_test_transaction("2024-05-01 12:00:00", 10.0, "x", "Tokyo", "Beijing");
        let same = create_test_transaction("2024-05-01 12:00:00", 10.0, "x", "Tokyo", "Tokyo");

        assert_eq!(check(&rule, &mismatch), Some(Flag::new(GEOLOCATION_MISMATCH, 40)));
        assert!(check(&rule, &same).is_none());
    }

    #[test]
    fn test_sanctioned_entity_substring() {
        let rule = SanctionedEntityRule::new(Catalogs::default().sanctioned_entities);
        let hit = create_test_transaction(
            "2024-05-01 12:00:00",
            10.0,
            "Payment to High-Risk Corp Beta from user123",
            "London",
            "London",
        );
        let miss = create_test_transaction(
            "2024-05-01 12:00:00",
            10.0,
            "Payment to GoodCorp from user123",
            "London",
            "London",
        );

        assert_eq!(check(&rule, &hit), Some(Flag::new(SANCTIONED_ENTITY, 100)));
        assert!(check(&rule, &miss).is_none());
    }

    #[test]
    fn test_high_amount_is_strict() {
        let rule = HighAmountRule::default();
        let exact = create_test_transaction("2024-05-01 12:00:00", 10_000.00, "x", "a", "a");
        let above = create_test_transaction("2024-05-01 12:00:00", 10_000.01, "x", "a", "a");

        assert!(check(&rule, &exact).is_none());
        assert_eq!(check(&rule, &above), Some(Flag::new(HIGH_AMOUNT, 30)));
    }

    #[test]
    fn test_high_velocity_follows_signal() {
        let tx = at("12:00:00");
        let on = HighVelocityRule::new(Arc::new(FixedVelocitySignal(true)));
        let off = HighVelocityRule::new(Arc::new(FixedVelocitySignal(false)));

        assert_eq!(check(&on, &tx), Some(Flag::new(HIGH_VELOCITY, 50)));
        assert!(check(&off, &tx).is_none());
    }

    #[test]
    fn test_random_signal_extremes() {
        let tx = at("12:00:00");
        assert!(!RandomVelocitySignal::new(0.0).is_high_velocity(&tx));
        assert!(RandomVelocitySignal::new(1.0).is_high_velocity(&tx));
    }

    #[test]
    fn test_risky_geolocation_moscow() {
        let rule = RiskyGeolocationRule::new(Catalogs::default().high_risk_locations);
        let tx = create_test_transaction("2024-05-01 12:00:00", 10.0, "x", "Moscow", "Moscow");
        assert_eq!(check(&rule, &tx), Some(Flag::new(RISKY_GEOLOCATION, 60)));
    }

    #[test]
    fn test_standard_order() {
        let rules = RuleSet::standard(&Catalogs::default(), Arc::new(FixedVelocitySignal(false)));
        assert_eq!(
            rules.names(),
            vec![
                UNUSUAL_HOURS,
                GEOLOCATION_MISMATCH,
                SANCTIONED_ENTITY,
                HIGH_AMOUNT,
                HIGH_VELOCITY,
                RISKY_GEOLOCATION
            ]
        );
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        assert!(RuleSet::new().validate().is_err());

        let duplicated = RuleSet::new()
            .with_rule(UnusualHoursRule)
            .with_rule(UnusualHoursRule);
        let err = duplicated.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate rule name"));
    }

    #[test]
    fn test_validate_rejects_blank_catalog_entry() {
        let rules = RuleSet::new().with_rule(SanctionedEntityRule::new(vec![
            "Acme".to_string(),
            "  ".to_string(),
        ]));
        assert!(matches!(
            rules.validate(),
            Err(SentinelError::RuleConfiguration(_))
        ));
    }
}
