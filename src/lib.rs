// Compliance Sentinel - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod transaction;
pub mod rules;       // Weighted rule registry
pub mod engine;      // Rule evaluation: flags + score
pub mod masking;     // Reversible placeholder masking
pub mod assistant;   // External text-service boundary
pub mod feed;        // Synthetic transaction feed
pub mod db;          // SQLite alert store
pub mod export;      // CSV compliance report

// Re-export commonly used types
pub use error::{SentinelError, SentinelResult};
pub use config::{AssistantConfig, Catalogs, SentinelConfig};
pub use transaction::{parse_timestamp, ScoredTransaction, Transaction, TIMESTAMP_FORMAT};
pub use rules::{
    Flag, Rule, RuleInput, RuleSet, VelocitySignal,
    RandomVelocitySignal, FixedVelocitySignal,
    UnusualHoursRule, GeolocationMismatchRule, SanctionedEntityRule,
    HighAmountRule, HighVelocityRule, RiskyGeolocationRule,
};
pub use engine::{EvaluationResult, RuleEvaluationEngine};
pub use masking::{mask, unmask, MaskingCodec, MaskingEntry, MaskingTable};
pub use assistant::{ComplianceAssistant, OfflineTextService, TextService};
pub use feed::TransactionFeed;
pub use db::{
    AlertStats, IngestSummary, StoredAlert,
    open_database, setup_database, insert_scored_transactions, ingest_transactions,
    get_flagged_transactions, alert_stats, verify_count,
};
pub use export::{export_to_file, render_flagged_csv, report_filename, write_flagged_csv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
