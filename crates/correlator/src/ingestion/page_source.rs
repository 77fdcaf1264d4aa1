//! Walks the paginated token-transfer listing of one wallet.
//!
//! Pages are visited from the last to the first so the oldest transfers are
//! surfaced first. Each row is reduced to a candidate and run through
//! [`RowFilter`]; the walk stops as soon as the target count of accepted
//! records is reached, which can be in the middle of a page.

use super::{pace, IngestSettings};
use crate::progress::ProgressSink;
use anyhow::Result;
use common::types::{ListingCell, ListingPage, TransactionRecord, WalletCounterparties, PLACEHOLDER};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SOURCE: &str = "page_source";

/// Rows with fewer cells than this are malformed.
const MIN_CELLS: usize = 9;
const TX_CELL: usize = 1;
const METHOD_CELL: usize = 6;
const FROM_CELL: usize = 7;
const STATUS_CELL: usize = 8;

pub trait ListingPager {
    /// Prefix for relative transaction links found in the listing.
    fn base_url(&self) -> &str;
    fn listing_url(&self, address: &str, page: u32) -> String;
    fn fetch_listing_page(
        &self,
        address: &str,
        page: u32,
    ) -> impl std::future::Future<Output = Result<ListingPage>> + Send;
}

/// Outcome of walking one wallet's listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSourceScan {
    pub wallet: String,
    pub total_pages: u32,
    pub pages_fetched: u32,
    pub pages_skipped: u32,
    pub malformed_rows: u32,
    pub records: Vec<TransactionRecord>,
    pub cancelled: bool,
}

impl PageSourceScan {
    pub fn counterparties(&self) -> WalletCounterparties {
        WalletCounterparties::from_records(&self.wallet, &self.records)
    }
}

/// Reads "Page X of N" and returns N. Anything else counts as a single page.
pub fn parse_total_pages(pagination_text: Option<&str>) -> u32 {
    static PAGE_OF: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = PAGE_OF
        .get_or_init(|| Regex::new(r"Page \d+ of (\d+)").ok())
        .as_ref()
    else {
        return 1;
    };
    pagination_text
        .and_then(|text| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// A listing row before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub tx_hash: String,
    pub tx_link: String,
    pub counterparty: Option<String>,
    pub method: String,
    pub status: String,
}

/// Returns `None` for rows without enough cells.
pub fn extract_candidate(row: &[ListingCell], base_url: &str) -> Option<Candidate> {
    if row.len() < MIN_CELLS {
        return None;
    }
    let tx = &row[TX_CELL];
    let tx_hash = tx
        .link_text
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let tx_link = tx.link_href.as_deref().map_or_else(
        || PLACEHOLDER.to_string(),
        |href| format!("{}{href}", base_url.trim_end_matches('/')),
    );
    Some(Candidate {
        tx_hash,
        tx_link,
        counterparty: row[FROM_CELL]
            .link_href
            .as_deref()
            .and_then(counterparty_from_href),
        method: span_or_placeholder(&row[METHOD_CELL]),
        status: span_or_placeholder(&row[STATUS_CELL]),
    })
}

fn span_or_placeholder(cell: &ListingCell) -> String {
    cell.span_text
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Pulls the address out of a "from" link. Handles both
/// `/address/0xabc#tokentxns` and `/token/0xtoken?a=0xabc`.
fn counterparty_from_href(href: &str) -> Option<String> {
    let without_fragment = href.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };
    let from_query = query.and_then(|q| {
        q.split('&')
            .find_map(|pair| pair.strip_prefix("a="))
            .map(str::trim)
            .filter(|a| !a.is_empty())
    });
    let address = from_query.or_else(|| {
        path.rsplit('/')
            .next()
            .map(str::trim)
            .filter(|seg| !seg.is_empty())
    })?;
    if address == PLACEHOLDER {
        return None;
    }
    Some(address.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    NoCounterparty,
    DuplicateCounterparty,
    ExcludedMethod,
}

/// Short-circuit acceptance rules for one wallet run, applied in order:
/// missing counterparty, already-seen counterparty, excluded method.
///
/// A counterparty is marked seen before the method check, so the first row
/// naming it decides; a later row cannot sneak it in after an excluded one.
pub struct RowFilter<'a> {
    seen: HashSet<String>,
    excluded_method: &'a str,
}

impl<'a> RowFilter<'a> {
    pub fn new(excluded_method: &'a str) -> Self {
        Self {
            seen: HashSet::new(),
            excluded_method,
        }
    }

    pub fn check(&mut self, candidate: &Candidate) -> Verdict {
        let Some(counterparty) = candidate.counterparty.as_deref() else {
            return Verdict::NoCounterparty;
        };
        if !self.seen.insert(counterparty.to_string()) {
            return Verdict::DuplicateCounterparty;
        }
        if !self.excluded_method.is_empty()
            && candidate.method.eq_ignore_ascii_case(self.excluded_method)
        {
            return Verdict::ExcludedMethod;
        }
        Verdict::Accept
    }
}

/// Collects up to `settings.target_count` accepted records for `wallet`.
///
/// Page 1 is fetched first to learn the page count; its response is reused
/// when the descending walk reaches it. Failed pages and pages without a
/// listing table are skipped. Never fails: a wallet that errors part-way
/// keeps what it already accepted.
pub async fn ingest_wallet_listing<P: ListingPager + Sync>(
    pager: &P,
    wallet: &str,
    settings: &IngestSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> PageSourceScan {
    let mut scan = PageSourceScan {
        wallet: wallet.to_string(),
        ..PageSourceScan::default()
    };
    if cancel.is_cancelled() {
        scan.cancelled = true;
        return scan;
    }

    let first = pager.fetch_listing_page(wallet, 1).await;
    scan.total_pages = match &first {
        Ok(page) => parse_total_pages(page.pagination_text.as_deref()),
        Err(e) => {
            warn!(wallet, error = %e, "failed to read page count; assuming a single page");
            1
        }
    };
    let mut cached_first = first.ok();
    progress.report(0.0, &format!("{wallet}: found {} pages", scan.total_pages));

    let mut filter = RowFilter::new(&settings.excluded_method);
    let target = settings.target();

    for (done, page) in (1..=scan.total_pages).rev().enumerate() {
        if scan.records.len() >= target {
            break;
        }
        if cancel.is_cancelled() {
            scan.cancelled = true;
            break;
        }

        let cached = if page == 1 { cached_first.take() } else { None };
        let fetched = match cached {
            Some(page_one) => Ok(page_one),
            None => {
                if !pace(settings.pacing_delay, cancel).await {
                    scan.cancelled = true;
                    break;
                }
                pager.fetch_listing_page(wallet, page).await
            }
        };

        match fetched {
            Ok(ListingPage {
                rows: Some(rows), ..
            }) => {
                scan.pages_fetched += 1;
                accept_rows(&mut scan, &mut filter, &rows, pager.base_url(), target);
            }
            Ok(ListingPage { rows: None, .. }) => {
                scan.pages_skipped += 1;
                metrics::counter!("correlator_pages_skipped_total", "source" => SOURCE).increment(1);
                warn!(wallet, page, "no transaction table on page; skipping");
            }
            Err(e) => {
                scan.pages_skipped += 1;
                metrics::counter!("correlator_pages_skipped_total", "source" => SOURCE).increment(1);
                warn!(
                    wallet,
                    page,
                    url = %pager.listing_url(wallet, page),
                    error = %e,
                    "failed to fetch listing page; skipping"
                );
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let fraction = (done + 1) as f64 / f64::from(scan.total_pages);
        progress.report(fraction, &format!("Scraped page {page} for {wallet}"));
    }

    metrics::counter!("correlator_records_accepted_total", "source" => SOURCE)
        .increment(scan.records.len() as u64);
    debug!(
        wallet,
        accepted = scan.records.len(),
        pages_fetched = scan.pages_fetched,
        pages_skipped = scan.pages_skipped,
        malformed_rows = scan.malformed_rows,
        "listing walk finished"
    );
    scan
}

fn accept_rows(
    scan: &mut PageSourceScan,
    filter: &mut RowFilter<'_>,
    rows: &[Vec<ListingCell>],
    base_url: &str,
    target: usize,
) {
    for row in rows {
        if scan.records.len() >= target {
            return;
        }
        let Some(candidate) = extract_candidate(row, base_url) else {
            scan.malformed_rows += 1;
            continue;
        };
        match filter.check(&candidate) {
            Verdict::Accept => {
                let Candidate {
                    tx_hash,
                    tx_link,
                    counterparty,
                    method,
                    status,
                } = candidate;
                scan.records.push(TransactionRecord {
                    wallet: scan.wallet.clone(),
                    tx_hash,
                    tx_link,
                    counterparty: counterparty.unwrap_or_default(),
                    method,
                    status,
                });
            }
            verdict => debug!(wallet = %scan.wallet, tx = %candidate.tx_hash, ?verdict, "row rejected"),
        }
    }
}
