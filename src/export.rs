// 📄 Compliance Report Export
// Flagged alerts as CSV, one row per stored alert

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::StoredAlert;

/// `compliance_report_YYYYMMDD.csv`
pub fn report_filename(date: NaiveDate) -> String {
    format!("compliance_report_{}.csv", date.format("%Y%m%d"))
}

/// Write a header row (the stored column names) followed by every alert.
/// Returns the number of data rows written.
pub fn write_flagged_csv<W: Write>(writer: W, alerts: &[StoredAlert]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    if alerts.is_empty() {
        // serde only emits headers alongside the first record
        wtr.write_record(HEADER)?;
    }

    for alert in alerts {
        wtr.serialize(alert)
            .with_context(|| format!("Failed to write alert {}", alert.transaction_id))?;
    }

    wtr.flush().context("Failed to flush CSV report")?;
    Ok(alerts.len())
}

/// Write the report to `path`, creating or truncating the file
pub fn export_to_file<P: AsRef<Path>>(path: P, alerts: &[StoredAlert]) -> Result<usize> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("Failed to create report file: {:?}", path.as_ref()))?;
    write_flagged_csv(file, alerts)
}

/// Render the report in memory (HTTP download)
pub fn render_flagged_csv(alerts: &[StoredAlert]) -> Result<String> {
    let mut buffer = Vec::new();
    write_flagged_csv(&mut buffer, alerts)?;
    String::from_utf8(buffer).context("CSV report is not valid UTF-8")
}

const HEADER: [&str; 12] = [
    "id",
    "transaction_id",
    "timestamp",
    "user_id",
    "amount",
    "currency",
    "description",
    "user_location",
    "transaction_location",
    "is_flagged",
    "flag_reason",
    "anomaly_score",
];
