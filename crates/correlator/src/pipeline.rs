//! Runs one ingestor over every requested wallet and feeds the correlator.
//!
//! Wallets may be scanned concurrently, but results are collected in input
//! order and reduced into the index on a single task, so the outcome does not
//! depend on the concurrency level.

use crate::correlation::{CorrelationIndex, CorrelationResult};
use crate::ingestion::cursor_api::{ingest_wallet_transfers, CursorScan, TransactionPager};
use crate::ingestion::page_source::{ingest_wallet_listing, ListingPager, PageSourceScan};
use crate::ingestion::IngestSettings;
use crate::progress::{ProgressSink, RunProgress};
use anyhow::Result;
use common::error::{RequestError, MAX_TARGET_COUNT};
use common::types::{Chain, WalletCounterparties};
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Rejects requests that cannot produce a meaningful run.
pub fn validate_request(wallets: &[String], target_count: u32) -> Result<(), RequestError> {
    if wallets.is_empty() {
        return Err(RequestError::NoWallets);
    }
    if target_count == 0 || target_count > MAX_TARGET_COUNT {
        return Err(RequestError::InvalidTargetCount(target_count));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub wallets: Vec<String>,
    pub settings: IngestSettings,
    /// Wallets scanned at once. `1` keeps the run strictly sequential.
    pub concurrency: usize,
}

/// Per-wallet numbers for the run summary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WalletSummary {
    pub wallet: String,
    pub records: usize,
    pub counterparties: usize,
    pub pages_fetched: u32,
    /// Why the walk ended, when the ingestor reports one.
    pub stop: Option<&'static str>,
}

impl From<&PageSourceScan> for WalletSummary {
    fn from(scan: &PageSourceScan) -> Self {
        Self {
            wallet: scan.wallet.clone(),
            records: scan.records.len(),
            counterparties: scan.counterparties().counterparties.len(),
            pages_fetched: scan.pages_fetched,
            stop: scan.cancelled.then_some("cancelled"),
        }
    }
}

impl From<&CursorScan> for WalletSummary {
    fn from(scan: &CursorScan) -> Self {
        Self {
            wallet: scan.wallet().to_string(),
            records: scan.transfers.len(),
            counterparties: scan.counterparties.counterparties.len(),
            pages_fetched: scan.pages_fetched,
            stop: Some(scan.stop.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub chain: Chain,
    pub wallets: Vec<WalletSummary>,
    pub result: CorrelationResult,
    pub cancelled: bool,
}

/// Scans each wallet with `scan`, at most `concurrency` at a time, and
/// returns the results in input order. Wallets not yet started when the run
/// is cancelled are left out.
async fn scan_wallets<'a, T, F, Fut>(
    wallets: &'a [String],
    concurrency: usize,
    progress: &'a RunProgress<'a>,
    cancel: &'a CancellationToken,
    scan: F,
) -> Vec<T>
where
    F: Fn(&'a str, usize) -> Fut,
    Fut: Future<Output = T> + 'a,
{
    let total = wallets.len();
    stream::iter(wallets.iter().enumerate())
        .take_while(|_| std::future::ready(!cancel.is_cancelled()))
        .map(|(i, wallet)| {
            progress.wallet(i).report(
                0.0,
                &format!("Processing wallet {} of {total}: {wallet}", i + 1),
            );
            scan(wallet.as_str(), i)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

fn reduce<'a>(
    chain: Chain,
    observations: impl IntoIterator<Item = &'a WalletCounterparties>,
) -> Result<CorrelationResult> {
    let mut index = CorrelationIndex::new();
    for observed in observations {
        if observed.counterparties.is_empty() {
            continue;
        }
        index.observe(observed)?;
    }
    let result = index.into_result();
    #[allow(clippy::cast_precision_loss)]
    let correlated = result.len() as f64;
    metrics::gauge!("correlator_correlated_counterparties", "chain" => chain.as_str())
        .set(correlated);
    Ok(result)
}

/// Page-source run: every wallet's listing, then correlation on "from" addresses.
pub async fn run_page_source<P: ListingPager + Sync>(
    pager: &P,
    request: &RunRequest,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    validate_request(&request.wallets, request.settings.target_count)?;
    let progress = RunProgress::new(sink, request.wallets.len());

    let scans = scan_wallets(
        &request.wallets,
        request.concurrency,
        &progress,
        cancel,
        |wallet, i| {
            let progress = &progress;
            async move {
                let scan = ingest_wallet_listing(
                    pager,
                    wallet,
                    &request.settings,
                    &progress.wallet(i),
                    cancel,
                )
                .await;
                metrics::counter!("correlator_wallets_scanned_total", "source" => "page_source")
                    .increment(1);
                scan
            }
        },
    )
    .await;

    let observations: Vec<WalletCounterparties> =
        scans.iter().map(PageSourceScan::counterparties).collect();
    finish(
        Chain::Ethereum,
        scans.iter().map(WalletSummary::from).collect(),
        &observations,
        sink,
        cancel,
    )
}

/// Cursor-API run: every wallet's transfers, then correlation on signers.
pub async fn run_cursor_api<P: TransactionPager + Sync>(
    pager: &P,
    request: &RunRequest,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    validate_request(&request.wallets, request.settings.target_count)?;
    let progress = RunProgress::new(sink, request.wallets.len());

    let scans = scan_wallets(
        &request.wallets,
        request.concurrency,
        &progress,
        cancel,
        |wallet, i| {
            let progress = &progress;
            async move {
                let scan = ingest_wallet_transfers(
                    pager,
                    wallet,
                    &request.settings,
                    &progress.wallet(i),
                    cancel,
                )
                .await;
                metrics::counter!("correlator_wallets_scanned_total", "source" => "cursor_api")
                    .increment(1);
                scan
            }
        },
    )
    .await;

    finish(
        Chain::Solana,
        scans.iter().map(WalletSummary::from).collect(),
        scans.iter().map(|s| &s.counterparties),
        sink,
        cancel,
    )
}

fn finish<'a>(
    chain: Chain,
    wallets: Vec<WalletSummary>,
    observations: impl IntoIterator<Item = &'a WalletCounterparties>,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    let result = reduce(chain, observations)?;
    let cancelled = cancel.is_cancelled();
    info!(
        chain = chain.as_str(),
        wallets = wallets.len(),
        correlated = result.len(),
        cancelled,
        "analysis finished"
    );
    sink.report(1.0, "Analysis complete");
    Ok(RunOutcome {
        chain,
        wallets,
        result,
        cancelled,
    })
}
