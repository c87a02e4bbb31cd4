// 🗄️ Alert Store - SQLite
// Scored transactions are written once and never re-scored

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::RuleEvaluationEngine;
use crate::transaction::{parse_timestamp, ScoredTransaction, Transaction, TIMESTAMP_FORMAT};

/// Score at or above which an alert counts as high risk
pub const HIGH_RISK_SCORE: u64 = 90;

/// A stored transaction row, as read back for alert listings and reports.
/// Field names match the column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAlert {
    pub id: i64,
    pub transaction_id: String,
    pub timestamp: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub user_location: String,
    pub transaction_location: String,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub anomaly_score: u64,
}

/// Dashboard counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total_alerts: i64,
    pub high_risk_count: i64,
    /// Local wall-clock time the counters were read (HH:MM:SS)
    pub last_updated: String,
}

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub flagged: usize,
    pub duplicates: usize,
    /// Records the engine refused to score
    pub rejected: usize,
}

/// Open (or create) the store at `path` and make sure the schema exists
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            transaction_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            user_id TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            description TEXT,
            user_location TEXT,
            transaction_location TEXT,
            is_flagged INTEGER NOT NULL DEFAULT 0,
            flag_reason TEXT,
            anomaly_score INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flagged_timestamp ON transactions(is_flagged, timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_anomaly_score ON transactions(anomaly_score)",
        [],
    )?;

    Ok(())
}

/// Persist scored transactions exactly as computed. Records already present
/// (same idempotency hash) are skipped, not re-scored.
pub fn insert_scored_transactions(
    conn: &Connection,
    scored: &[ScoredTransaction],
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for item in scored {
        let tx = &item.transaction;
        let hash = tx.compute_idempotency_hash();
        let score = i64::try_from(item.anomaly_score())
            .with_context(|| format!("anomaly score out of range for {}", tx.id))?;
        // Stored in one layout so the text column sorts chronologically
        let timestamp = parse_timestamp(&tx.timestamp)
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .with_context(|| format!("unparseable timestamp for {}", tx.id))?;

        let result = conn.execute(
            "INSERT INTO transactions (
                idempotency_hash, transaction_id, timestamp, user_id, amount, currency,
                description, user_location, transaction_location,
                is_flagged, flag_reason, anomaly_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                hash,
                tx.id,
                timestamp,
                tx.user_id,
                tx.amount,
                tx.currency,
                tx.description,
                tx.user_location,
                tx.transaction_location,
                item.is_flagged(),
                item.flag_reason(),
                score,
            ],
        );

        match result {
            Ok(_) => {
                summary.inserted += 1;
                if item.is_flagged() {
                    summary.flagged += 1;
                }
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                tracing::debug!(transaction_id = %tx.id, "duplicate transaction skipped");
                summary.duplicates += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to store transaction {}", tx.id))
            }
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        flagged = summary.flagged,
        duplicates = summary.duplicates,
        "ingested scored transactions"
    );

    Ok(summary)
}

/// Score a raw batch and store what could be scored. Rejected records are
/// logged by the engine and counted, never stored.
pub fn ingest_transactions(
    conn: &Connection,
    engine: &RuleEvaluationEngine,
    transactions: &[Transaction],
) -> Result<IngestSummary> {
    let scored: Vec<ScoredTransaction> = engine
        .evaluate_batch(transactions)
        .into_iter()
        .filter_map(|result| result.ok())
        .collect();
    let rejected = transactions.len() - scored.len();

    let mut summary = insert_scored_transactions(conn, &scored)?;
    summary.rejected = rejected;
    Ok(summary)
}

const ALERT_COLUMNS: &str = "id, transaction_id, timestamp, user_id, amount, currency,
    COALESCE(description, ''), COALESCE(user_location, ''), COALESCE(transaction_location, ''),
    is_flagged, flag_reason, anomaly_score";

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<StoredAlert> {
    let score: i64 = row.get(11)?;
    Ok(StoredAlert {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        description: row.get(6)?,
        user_location: row.get(7)?,
        transaction_location: row.get(8)?,
        is_flagged: row.get(9)?,
        flag_reason: row.get(10)?,
        anomaly_score: u64::try_from(score).unwrap_or(0),
    })
}

/// Flagged transactions, newest first. `None` returns every alert.
pub fn get_flagged_transactions(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredAlert>> {
    // SQLite treats a negative LIMIT as "no limit"
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(&format!(
        "SELECT {}
         FROM transactions
         WHERE is_flagged = 1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?1",
        ALERT_COLUMNS
    ))?;

    let alerts = stmt
        .query_map(params![limit], alert_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(alerts)
}

pub fn alert_stats(conn: &Connection) -> Result<AlertStats> {
    let total_alerts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE is_flagged = 1",
        [],
        |row| row.get(0),
    )?;

    let high_risk_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE anomaly_score >= ?1",
        params![HIGH_RISK_SCORE as i64],
        |row| row.get(0),
    )?;

    Ok(AlertStats {
        total_alerts,
        high_risk_count,
        last_updated: Local::now().format("%H:%M:%S").to_string(),
    })
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}
