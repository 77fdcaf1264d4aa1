use super::{pace, IngestSettings};
use crate::progress::ProgressSink;
use anyhow::Result;
use common::types::{ApiTransaction, ApiTransactionPage, TransferRecord, WalletCounterparties, PLACEHOLDER};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SOURCE: &str = "cursor_api";

pub trait TransactionPager {
    fn transactions_url(&self, address: &str, page_size: u32, before: Option<&str>) -> String;
    fn fetch_transaction_page(
        &self,
        address: &str,
        page_size: u32,
        before: Option<&str>,
    ) -> impl std::future::Future<Output = Result<ApiTransactionPage>> + Send;
}

/// Why a wallet's cursor walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// The endpoint reported no data or returned an empty page.
    Exhausted,
    /// A request failed; treated as the end of this wallet's data.
    FetchFailed,
    /// The cursor could not advance (missing or repeated hash).
    CursorStalled,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetReached => "target_reached",
            Self::Exhausted => "exhausted",
            Self::FetchFailed => "fetch_failed",
            Self::CursorStalled => "cursor_stalled",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorScan {
    pub pages_fetched: u32,
    pub transfers: Vec<TransferRecord>,
    pub counterparties: WalletCounterparties,
    pub stop: StopReason,
}

impl CursorScan {
    pub fn wallet(&self) -> &str {
        &self.counterparties.wallet
    }
}

/// A transaction counts when any of its parsed instructions has the transfer
/// type. No instruction list means no transfer.
pub fn is_transfer(tx: &ApiTransaction, transfer_type: &str) -> bool {
    tx.parsed_instruction.as_deref().is_some_and(|ixs| {
        ixs.iter()
            .any(|ix| ix.instruction_type.as_deref() == Some(transfer_type))
    })
}

fn to_transfer(tx: &ApiTransaction, wallet: &str) -> TransferRecord {
    TransferRecord {
        wallet: wallet.to_string(),
        tx_hash: tx
            .tx_hash
            .clone()
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        signers: tx
            .signer
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect(),
    }
}

/// Follows the `before` cursor for `wallet` until one of, checked in order:
/// the target number of valid transfers is reached, a request fails, the
/// endpoint runs out of data, or the cursor cannot advance.
///
/// The cursor for the next request is always the hash of the last raw
/// transaction of the previous page, whether or not it passed the filter.
pub async fn ingest_wallet_transfers<P: TransactionPager + Sync>(
    pager: &P,
    wallet: &str,
    settings: &IngestSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> CursorScan {
    let target = settings.target();
    let mut before: Option<String> = None;
    let mut pages_fetched = 0_u32;
    let mut transfers: Vec<TransferRecord> = Vec::new();
    let mut counterparties = WalletCounterparties::new(wallet);

    let stop = loop {
        if transfers.len() >= target {
            break StopReason::TargetReached;
        }
        if !pace(settings.pacing_delay, cancel).await {
            break StopReason::Cancelled;
        }

        let page = match pager
            .fetch_transaction_page(wallet, settings.page_size, before.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    wallet,
                    url = %pager.transactions_url(wallet, settings.page_size, before.as_deref()),
                    error = %e,
                    "transaction page fetch failed; keeping transfers collected so far"
                );
                break StopReason::FetchFailed;
            }
        };
        pages_fetched += 1;

        let raw = match page.transactions() {
            Some(raw) if !raw.is_empty() => raw,
            _ => break StopReason::Exhausted,
        };

        for tx in raw.iter().filter(|tx| is_transfer(tx, &settings.transfer_instruction_type)) {
            let transfer = to_transfer(tx, wallet);
            counterparties
                .counterparties
                .extend(transfer.signers.iter().cloned());
            transfers.push(transfer);
        }

        match raw.last().and_then(|tx| tx.tx_hash.clone()) {
            Some(next) if before.as_deref() != Some(next.as_str()) => before = Some(next),
            _ => {
                warn!(wallet, "cursor did not advance; stopping");
                break StopReason::CursorStalled;
            }
        }
    };

    metrics::counter!("correlator_records_accepted_total", "source" => SOURCE)
        .increment(transfers.len() as u64);
    debug!(
        wallet,
        transfers = transfers.len(),
        signers = counterparties.counterparties.len(),
        pages_fetched,
        stop = stop.as_str(),
        "cursor walk finished"
    );
    progress.report(
        1.0,
        &format!(
            "{wallet}: {} transfers, {} signers",
            transfers.len(),
            counterparties.counterparties.len()
        ),
    );

    CursorScan {
        pages_fetched,
        transfers,
        counterparties,
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::RecordingProgress;
    use common::types::{ApiInstruction, ApiTransactionData};
    use std::sync::Mutex;
    use std::time::Duration;

    fn tx(hash: &str, kind: Option<&str>, signers: &[&str]) -> ApiTransaction {
        ApiTransaction {
            tx_hash: Some(hash.to_string()),
            parsed_instruction: kind.map(|k| {
                vec![ApiInstruction {
                    instruction_type: Some(k.to_string()),
                }]
            }),
            signer: signers.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn ok_page(txs: Vec<ApiTransaction>) -> ApiTransactionPage {
        ApiTransactionPage {
            success: true,
            data: Some(ApiTransactionData {
                transactions: Some(txs),
            }),
        }
    }

    /// Serves scripted pages in order and records the cursor of every call.
    struct FakeTransactionPager {
        pages: Mutex<Vec<Result<ApiTransactionPage>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl FakeTransactionPager {
        fn new(pages: Vec<Result<ApiTransactionPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    impl TransactionPager for FakeTransactionPager {
        fn transactions_url(&self, address: &str, page_size: u32, before: Option<&str>) -> String {
            format!("https://api.test/tx?address={address}&page_size={page_size}&before={before:?}")
        }

        async fn fetch_transaction_page(
            &self,
            _address: &str,
            _page_size: u32,
            before: Option<&str>,
        ) -> Result<ApiTransactionPage> {
            self.cursors.lock().unwrap().push(before.map(str::to_string));
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(ok_page(vec![])))
        }
    }

    fn settings(target: u32) -> IngestSettings {
        IngestSettings {
            target_count: target,
            page_size: 40,
            pacing_delay: Duration::from_secs(2),
            excluded_method: String::new(),
            transfer_instruction_type: "transfer".to_string(),
        }
    }

    /// 40 raw records, every fourth one a transfer; the last record is not.
    fn mostly_filtered_page(prefix: &str) -> Vec<ApiTransaction> {
        (1..=40)
            .map(|i| {
                let kind = if i % 4 == 1 { "transfer" } else { "swap" };
                tx(&format!("{prefix}{i}"), Some(kind), &[&format!("signer{i}")])
            })
            .collect()
    }

    #[test]
    fn test_is_transfer_checks_every_instruction() {
        assert!(is_transfer(&tx("h", Some("transfer"), &[]), "transfer"));
        assert!(!is_transfer(&tx("h", Some("swap"), &[]), "transfer"));
        assert!(!is_transfer(&tx("h", None, &[]), "transfer"));
        assert!(!is_transfer(&tx("h", Some("Transfer"), &[]), "transfer"));

        let mut second = tx("h", Some("swap"), &[]);
        second.parsed_instruction.as_mut().unwrap().push(ApiInstruction {
            instruction_type: Some("transfer".to_string()),
        });
        assert!(is_transfer(&second, "transfer"));

        let mut empty = tx("h", None, &[]);
        empty.parsed_instruction = Some(vec![]);
        assert!(!is_transfer(&empty, "transfer"));
    }

    #[test]
    fn test_blank_signers_are_dropped() {
        let t = to_transfer(&tx("h", Some("transfer"), &["S1", " ", "", "\t"]), "W1");
        assert_eq!(t.signers, vec!["S1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_advances_to_last_raw_hash_then_exhausts() {
        let pager = FakeTransactionPager::new(vec![
            Ok(ok_page(mostly_filtered_page("a"))),
            Ok(ok_page(vec![])),
        ]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(100),
            &progress,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(scan.transfers.len(), 10);
        assert_eq!(scan.stop, StopReason::Exhausted);
        // Second call carries the hash of raw record #40 even though it was filtered out.
        assert_eq!(pager.cursors(), vec![None, Some("a40".to_string())]);
        assert_eq!(scan.counterparties.counterparties.len(), 10);
        assert!(!scan.counterparties.counterparties.contains("signer2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_chain_across_pages() {
        let pager = FakeTransactionPager::new(vec![
            Ok(ok_page(mostly_filtered_page("a"))),
            Ok(ok_page(mostly_filtered_page("b"))),
            Ok(ok_page(mostly_filtered_page("c"))),
        ]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(15),
            &progress,
            &CancellationToken::new(),
        )
        .await;

        // Target is checked between pages, so the whole second page is kept.
        assert_eq!(scan.transfers.len(), 20);
        assert_eq!(scan.stop, StopReason::TargetReached);
        assert_eq!(pager.cursors(), vec![None, Some("a40".to_string())]);
        assert_eq!(scan.pages_fetched, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_partial_results() {
        let pager = FakeTransactionPager::new(vec![
            Ok(ok_page(vec![tx("t1", Some("transfer"), &["S1", "S2"])])),
            Err(anyhow::anyhow!("upstream returned 500")),
        ]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(10),
            &progress,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(scan.stop, StopReason::FetchFailed);
        assert_eq!(scan.transfers.len(), 1);
        assert_eq!(scan.transfers[0].signers, vec!["S1", "S2"]);
        assert_eq!(progress.fractions(), vec![1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsuccessful_response_is_exhaustion() {
        let pager = FakeTransactionPager::new(vec![Ok(ApiTransactionPage {
            success: false,
            data: None,
        })]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(10),
            &progress,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(scan.stop, StopReason::Exhausted);
        assert!(scan.transfers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_cursor_stops_instead_of_looping() {
        let same = || Ok(ok_page(vec![tx("dup", Some("swap"), &[])]));
        let pager = FakeTransactionPager::new(vec![same(), same(), same()]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(10),
            &progress,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(scan.stop, StopReason::CursorStalled);
        assert_eq!(pager.cursors().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_last_hash_stops() {
        let mut last = tx("x", Some("transfer"), &["S"]);
        last.tx_hash = None;
        let pager = FakeTransactionPager::new(vec![Ok(ok_page(vec![last]))]);
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(10),
            &progress,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(scan.stop, StopReason::CursorStalled);
        assert_eq!(scan.transfers[0].tx_hash, PLACEHOLDER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_applied_before_each_request() {
        let pager = FakeTransactionPager::new(vec![
            Ok(ok_page(mostly_filtered_page("a"))),
            Ok(ok_page(vec![])),
        ]);
        let start = tokio::time::Instant::now();
        let progress = RecordingProgress::default();
        ingest_wallet_transfers(
            &pager,
            "W1",
            &settings(100),
            &progress,
            &CancellationToken::new(),
        )
        .await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_makes_no_requests() {
        let pager = FakeTransactionPager::new(vec![Ok(ok_page(mostly_filtered_page("a")))]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let progress = RecordingProgress::default();
        let scan = ingest_wallet_transfers(&pager, "W1", &settings(10), &progress, &cancel).await;
        assert_eq!(scan.stop, StopReason::Cancelled);
        assert!(pager.cursors().is_empty());
    }
}
