// 🎲 Transaction Feed - Synthetic Source
// Produces raw transactions shaped like the production feed

use chrono::{Duration, NaiveDateTime};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::Catalogs;
use crate::transaction::{Transaction, TIMESTAMP_FORMAT};

const MIN_AMOUNT: f64 = 5.0;
const MAX_AMOUNT: f64 = 20_000.0;
const MAX_AGE_MINUTES: i64 = 60;

pub struct TransactionFeed<R: Rng> {
    catalogs: Catalogs,
    rng: R,
}

impl TransactionFeed<ThreadRng> {
    /// Feed backed by the thread-local generator
    pub fn new(catalogs: Catalogs) -> Self {
        TransactionFeed::with_rng(catalogs, rand::thread_rng())
    }
}

impl<R: Rng> TransactionFeed<R> {
    /// Feed with an explicit generator (seeded in tests)
    pub fn with_rng(catalogs: Catalogs, rng: R) -> Self {
        TransactionFeed { catalogs, rng }
    }

    /// One transaction stamped up to an hour before `now`.
    /// Returns `None` when the catalogs have no users or locations.
    pub fn next_transaction(&mut self, now: NaiveDateTime) -> Option<Transaction> {
        let users: Vec<(&String, &String)> = self.catalogs.user_locations.iter().collect();
        let (user_id, home) = *users.choose(&mut self.rng)?;
        let location = self.catalogs.transaction_locations.choose(&mut self.rng)?;

        let counterparties: Vec<&String> = self
            .catalogs
            .sanctioned_entities
            .iter()
            .chain(self.catalogs.benign_merchants.iter())
            .collect();
        let counterparty = counterparties.choose(&mut self.rng)?;

        let age = Duration::minutes(self.rng.gen_range(0..=MAX_AGE_MINUTES));
        let amount = (self.rng.gen_range(MIN_AMOUNT..=MAX_AMOUNT) * 100.0).round() / 100.0;

        Some(Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: (now - age).format(TIMESTAMP_FORMAT).to_string(),
            user_id: user_id.clone(),
            amount,
            currency: "USD".to_string(),
            description: format!("Payment to {} from {}", counterparty, user_id),
            user_location: home.clone(),
            transaction_location: location.clone(),
        })
    }

    /// Up to `count` transactions; fewer only if the catalogs are empty
    pub fn generate(&mut self, count: usize, now: NaiveDateTime) -> Vec<Transaction> {
        (0..count)
            .map_while(|_| self.next_transaction(now))
            .collect()
    }

    /// Batch size for one poll, uniform in `min..=max`
    pub fn random_batch_size(&mut self, min: usize, max: usize) -> usize {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::parse_timestamp;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded() -> TransactionFeed<StdRng> {
        TransactionFeed::with_rng(Catalogs::default(), StdRng::seed_from_u64(7))
    }

    fn now() -> NaiveDateTime {
        parse_timestamp("2024-05-01 12:00:00").unwrap()
    }

    #[test]
    fn test_generated_transactions_are_well_formed() {
        let catalogs = Catalogs::default();
        let batch = seeded().generate(50, now());

        assert_eq!(batch.len(), 50);
        for tx in &batch {
            let at = tx.validate().unwrap();
            assert!(at <= now() && at >= now() - Duration::minutes(60));
            assert!(tx.amount >= 5.0 && tx.amount <= 20_000.0);
            assert_eq!(tx.currency, "USD");
            assert_eq!(catalogs.user_locations.get(&tx.user_id), Some(&tx.user_location));
            assert!(catalogs.transaction_locations.contains(&tx.transaction_location));
            assert!(tx.description.starts_with("Payment to "));
            assert!(tx.description.ends_with(&format!("from {}", tx.user_id)));
        }
    }

    #[test]
    fn test_amounts_are_rounded_to_cents() {
        for tx in seeded().generate(20, now()) {
            let cents = tx.amount * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_catalog_yields_nothing() {
        let mut catalogs = Catalogs::default();
        catalogs.user_locations.clear();
        let mut feed = TransactionFeed::with_rng(catalogs, StdRng::seed_from_u64(1));

        assert!(feed.next_transaction(now()).is_none());
        assert!(feed.generate(3, now()).is_empty());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut feed = seeded();
        for _ in 0..100 {
            let size = feed.random_batch_size(1, 4);
            assert!((1..=4).contains(&size));
        }
        assert_eq!(feed.random_batch_size(3, 3), 3);
    }
}
