use crate::ingestion::cursor_api::TransactionPager;
use crate::ingestion::page_source::ListingPager;
use anyhow::Result;
use common::error::FetchError;
use common::etherscan::EtherscanClient;
use common::solscan::SolscanClient;
use common::types::{ApiTransactionPage, ListingPage};
use std::future::Future;
use std::time::Instant;

/// Times one upstream call and records the request/error counters.
async fn instrumented<T>(
    endpoint: &'static str,
    call: impl Future<Output = std::result::Result<T, FetchError>>,
) -> Result<T> {
    let start = Instant::now();
    let res = call.await;
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("correlator_api_latency_ms", "endpoint" => endpoint).record(ms);
    match res {
        Ok(v) => {
            metrics::counter!("correlator_api_requests_total", "endpoint" => endpoint, "status" => "ok").increment(1);
            Ok(v)
        }
        Err(e) => {
            metrics::counter!("correlator_api_requests_total", "endpoint" => endpoint, "status" => "error").increment(1);
            metrics::counter!(
                "correlator_api_errors_total",
                "endpoint" => endpoint,
                "kind" => e.kind().as_str()
            )
            .increment(1);
            Err(e.into())
        }
    }
}

impl ListingPager for EtherscanClient {
    fn base_url(&self) -> &str {
        EtherscanClient::base_url(self)
    }

    fn listing_url(&self, address: &str, page: u32) -> String {
        EtherscanClient::listing_url(self, address, page)
    }

    async fn fetch_listing_page(&self, address: &str, page: u32) -> Result<ListingPage> {
        instrumented(
            "etherscan_listing",
            EtherscanClient::fetch_listing_page(self, address, page),
        )
        .await
    }
}

impl TransactionPager for SolscanClient {
    fn transactions_url(&self, address: &str, page_size: u32, before: Option<&str>) -> String {
        SolscanClient::transactions_url(self, address, page_size, before)
    }

    async fn fetch_transaction_page(
        &self,
        address: &str,
        page_size: u32,
        before: Option<&str>,
    ) -> Result<ApiTransactionPage> {
        instrumented(
            "solscan_transactions",
            SolscanClient::fetch_transaction_page(self, address, page_size, before),
        )
        .await
    }
}
