use crate::correlation::CorrelationResult;
use crate::pipeline::{RunOutcome, WalletSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::types::Chain;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

pub const NO_CORRELATIONS: &str = "no common counterparties found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// `ethereum_analysis.csv`, `solana_analysis.json`, ...
pub fn default_export_name(chain: Chain, format: ExportFormat) -> String {
    format!("{}_analysis.{}", chain.as_str(), format.extension())
}

/// One counterparty with the wallets it was seen under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub counterparty: String,
    pub wallet_count: usize,
    pub wallets: Vec<String>,
}

/// Most-connected counterparties first; ties broken by address.
pub fn report_rows(result: &CorrelationResult) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = result
        .iter()
        .map(|(counterparty, wallets)| ReportRow {
            counterparty: counterparty.clone(),
            wallet_count: wallets.len(),
            wallets: wallets.iter().cloned().collect(),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.wallet_count
            .cmp(&a.wallet_count)
            .then_with(|| a.counterparty.cmp(&b.counterparty))
    });
    rows
}

pub fn write_csv<W: Write>(writer: W, chain: Chain, result: &CorrelationResult) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        chain.counterparty_label(),
        "Number of Connected Wallets",
        "Connected Wallets",
    ])?;
    for row in report_rows(result) {
        csv.write_record([
            row.counterparty,
            row.wallet_count.to_string(),
            row.wallets.join(", "),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    chain: Chain,
    generated_at: DateTime<Utc>,
    cancelled: bool,
    wallets: &'a [WalletSummary],
    correlations: Vec<ReportRow>,
}

pub fn write_json<W: Write>(
    writer: W,
    outcome: &RunOutcome,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let report = JsonReport {
        chain: outcome.chain,
        generated_at,
        cancelled: outcome.cancelled,
        wallets: &outcome.wallets,
        correlations: report_rows(&outcome.result),
    };
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}

/// Writes the report to `path`, replacing any existing file.
pub fn export(path: &Path, format: ExportFormat, outcome: &RunOutcome) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    match format {
        ExportFormat::Csv => write_csv(&mut out, outcome.chain, &outcome.result)?,
        ExportFormat::Json => write_json(&mut out, outcome, Utc::now())?,
    }
    out.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Human-readable summary for stdout.
pub fn render_summary(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} analysis ===", outcome.chain.as_str());
    if outcome.cancelled {
        let _ = writeln!(out, "(cancelled; results are partial)");
    }
    let _ = writeln!(
        out,
        "{:<46} {:>8} {:>14} {:>6}",
        "wallet", "records", "counterparties", "pages"
    );
    for w in &outcome.wallets {
        let _ = writeln!(
            out,
            "{:<46} {:>8} {:>14} {:>6}",
            w.wallet, w.records, w.counterparties, w.pages_fetched
        );
    }
    let _ = writeln!(out);

    if outcome.result.is_empty() {
        let _ = writeln!(out, "{NO_CORRELATIONS}");
        return out;
    }
    let _ = writeln!(
        out,
        "{:<46} {:>7}  {}",
        outcome.chain.counterparty_label(),
        "wallets",
        "connected"
    );
    for row in report_rows(&outcome.result) {
        let _ = writeln!(
            out,
            "{:<46} {:>7}  {}",
            row.counterparty,
            row.wallet_count,
            row.wallets.join(", ")
        );
    }
    out
}
