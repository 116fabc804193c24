//! One-off report export for the `score_protocol` CLI
//!
//! Writes, per scored protocol, a JSON report with every component, a CSV
//! summary row and the adjusted revenue series as CSV (so reattributions can be
//! audited). Runs with more than one record also get combined
//! `all_protocols_<timestamp>` files.

use super::StoreError;
use crate::scoring::{RevenueSeries, ScoreRecord, ScoringRunReport};
use chrono::{SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Both,
}

impl ReportFormat {
    pub fn includes_json(self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::Both)
    }

    pub fn includes_csv(self) -> bool {
        matches!(self, ReportFormat::Csv | ReportFormat::Both)
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            "both" => Ok(ReportFormat::Both),
            other => Err(format!("unknown format '{}' (expected json, csv or both)", other)),
        }
    }
}

const SUMMARY_HEADER: &str =
    "protocol_id,category,eqs,ugs,fvs,ss,how3_score,calculated_at,fallbacks";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One summary row per record, with a header line
pub fn summary_csv(records: &[ScoreRecord]) -> String {
    let mut out = String::from(SUMMARY_HEADER);
    out.push('\n');
    for record in records {
        let fallbacks: Vec<&str> = record
            .components
            .fallbacks
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        out.push_str(&format!(
            "{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{},{}\n",
            csv_field(&record.protocol_id),
            csv_field(&record.components.category),
            record.eqs,
            record.ugs,
            record.fvs,
            record.ss,
            record.how3_score,
            record.calculated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            csv_field(&fallbacks.join(";")),
        ));
    }
    out
}

/// Adjusted revenue as `month,source,amount_usd` rows
pub fn adjusted_revenue_csv(series: &RevenueSeries) -> String {
    let mut out = String::from("month,source,amount_usd\n");
    for row in series.to_rows() {
        out.push_str(&format!(
            "{},{},{}\n",
            row.month,
            csv_field(&row.source),
            row.amount_usd
        ));
    }
    out
}

/// Write the run's reports into `out_dir`; returns the files written
pub fn export_run(
    out_dir: &Path,
    report: &ScoringRunReport,
    format: ReportFormat,
) -> Result<Vec<PathBuf>, StoreError> {
    fs::create_dir_all(out_dir)?;
    let stamp = report
        .calculated_at
        .unwrap_or_else(Utc::now)
        .format("%Y%m%d_%H%M%S")
        .to_string();
    let mut written = Vec::new();

    for record in &report.records {
        let base = format!("{}_{}", record.protocol_id, stamp);

        if format.includes_json() {
            let path = out_dir.join(format!("{}_report.json", base));
            fs::write(&path, serde_json::to_string_pretty(record)?)?;
            written.push(path);
        }

        if format.includes_csv() {
            let path = out_dir.join(format!("{}_scores.csv", base));
            fs::write(&path, summary_csv(std::slice::from_ref(record)))?;
            written.push(path);

            if let Some(series) = report.adjusted_revenue.get(&record.protocol_id) {
                let path = out_dir.join(format!("{}_adjusted_revenue.csv", base));
                fs::write(&path, adjusted_revenue_csv(series))?;
                written.push(path);
            }
        }
    }

    if report.records.len() > 1 {
        if format.includes_json() {
            let path = out_dir.join(format!("all_protocols_{}.json", stamp));
            fs::write(&path, serde_json::to_string_pretty(&report.records)?)?;
            written.push(path);
        }
        if format.includes_csv() {
            let path = out_dir.join(format!("all_protocols_{}.csv", stamp));
            fs::write(&path, summary_csv(&report.records))?;
            written.push(path);
        }
    }

    for path in &written {
        log::info!("💾 Saved {}", path.display());
    }
    Ok(written)
}
