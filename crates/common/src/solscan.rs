use crate::config::{Http, Solscan};
use crate::error::FetchError;
use crate::http::{build_client, get_text_with_retry, RetryPolicy};
use crate::types::ApiTransactionPage;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, ORIGIN, REFERER};
use reqwest::Url;

/// Client for the cursor-paginated account transaction endpoint (Chain B).
pub struct SolscanClient {
    api_url: Url,
    referer: String,
    origin: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl SolscanClient {
    pub fn new(cfg: &Solscan, http: &Http) -> Result<Self> {
        let api_url = Url::parse(&cfg.api_url)
            .with_context(|| format!("invalid solscan.api_url {}", cfg.api_url))?;
        Ok(Self {
            api_url,
            referer: cfg.referer.clone(),
            origin: cfg.referer.trim_end_matches('/').to_string(),
            client: build_client(http)?,
            retry: RetryPolicy::from(http),
        })
    }

    pub fn transactions_url(&self, address: &str, page_size: u32, before: Option<&str>) -> String {
        let mut url = self.api_url.clone();
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("address", address);
            qp.append_pair("page_size", &page_size.to_string());
            if let Some(cursor) = before {
                qp.append_pair("before", cursor);
            }
        }
        url.to_string()
    }

    pub async fn fetch_transaction_page(
        &self,
        address: &str,
        page_size: u32,
        before: Option<&str>,
    ) -> Result<ApiTransactionPage, FetchError> {
        let url = self.transactions_url(address, page_size, before);
        tracing::debug!(url = %url, "fetching transaction page");
        let body = get_text_with_retry(self.retry, "solscan_transactions", || {
            self.client
                .get(&url)
                .header(ACCEPT, "application/json, text/plain, */*")
                .header(REFERER, &self.referer)
                .header(ORIGIN, &self.origin)
        })
        .await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
