//! Client for the paginated token-transfer listing (Chain A).
//!
//! The site only serves HTML, so each page is reduced to a [`ListingPage`]:
//! the pagination indicator text and a table of cells. Interpreting the cells
//! is left to the ingestor.

use crate::config::{Etherscan, Http};
use crate::error::FetchError;
use crate::http::{build_client, get_text_with_retry, RetryPolicy};
use crate::types::{ListingCell, ListingPage, ListingRow};
use anyhow::{Context, Result};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

pub struct EtherscanClient {
    base_url: String,
    listing_url: Url,
    page_size: u32,
    client: reqwest::Client,
    retry: RetryPolicy,
    parser: ListingParser,
}

impl EtherscanClient {
    pub fn new(cfg: &Etherscan, http: &Http) -> Result<Self> {
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let listing_url = Url::parse(&format!("{base_url}/tokentxns"))
            .with_context(|| format!("invalid etherscan.base_url {}", cfg.base_url))?;
        Ok(Self {
            base_url,
            listing_url,
            page_size: cfg.page_size,
            client: build_client(http)?,
            retry: RetryPolicy::from(http),
            parser: ListingParser::new()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn listing_url(&self, address: &str, page: u32) -> String {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut()
            .append_pair("a", address)
            .append_pair("ps", &self.page_size.to_string())
            .append_pair("p", &page.to_string());
        url.to_string()
    }

    /// Fetches and parses one listing page (1-based).
    pub async fn fetch_listing_page(
        &self,
        address: &str,
        page: u32,
    ) -> Result<ListingPage, FetchError> {
        let url = self.listing_url(address, page);
        tracing::debug!(url = %url, "fetching listing page");
        let body = get_text_with_retry(self.retry, "etherscan_listing", || {
            self.client.get(&url)
        })
        .await?;
        Ok(self.parser.parse(&body))
    }
}

pub struct ListingParser {
    pagination: Selector,
    table: Selector,
    row: Selector,
    cell: Selector,
    link: Selector,
    span: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pagination: selector("span.page-link.text-nowrap")?,
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td")?,
            link: selector("a")?,
            span: selector("span")?,
        })
    }

    pub fn parse(&self, html: &str) -> ListingPage {
        let doc = Html::parse_document(html);
        let pagination_text = doc.select(&self.pagination).next().map(element_text);
        // First row is the header.
        let rows = doc.select(&self.table).next().map(|table| {
            table
                .select(&self.row)
                .skip(1)
                .map(|tr| self.parse_row(tr))
                .collect()
        });
        ListingPage {
            pagination_text,
            rows,
        }
    }

    fn parse_row(&self, tr: ElementRef<'_>) -> ListingRow {
        tr.select(&self.cell)
            .map(|td| {
                let link = td.select(&self.link).next();
                ListingCell {
                    link_text: link.map(element_text),
                    link_href: link
                        .and_then(|a| a.value().attr("href"))
                        .map(str::to_string),
                    span_text: td.select(&self.span).next().map(element_text),
                }
            })
            .collect()
    }
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector {css}: {e:?}"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EtherscanClient {
        let cfg = Etherscan {
            base_url: "https://etherscan.io/".to_string(),
            page_size: 100,
            pacing_delay_ms: 0,
            excluded_method: "execute".to_string(),
        };
        let http = Http {
            timeout_secs: 5,
            max_retries: 0,
            backoff_base_ms: 0,
            user_agent: "test".to_string(),
        };
        EtherscanClient::new(&cfg, &http).unwrap()
    }

    #[test]
    fn test_listing_url() {
        let url = client().listing_url("0xabc", 3);
        assert_eq!(url, "https://etherscan.io/tokentxns?a=0xabc&ps=100&p=3");
    }

    #[test]
    fn test_parse_pagination_and_rows() {
        let html = r#"
            <html><body>
              <span class="page-link text-nowrap">Page <strong>1</strong> of <strong>7</strong></span>
              <table>
                <tr><th>Txn</th></tr>
                <tr>
                  <td></td>
                  <td><a href="/tx/0xhash1">0xhash1</a></td>
                  <td></td><td></td><td></td><td></td>
                  <td><span> Transfer </span></td>
                  <td><a href="/address/0xfrom1#tokentxns">0xfrom1</a></td>
                  <td><span>IN</span></td>
                </tr>
                <tr><td>short</td></tr>
              </table>
            </body></html>
        "#;
        let page = ListingParser::new().unwrap().parse(html);
        assert_eq!(page.pagination_text.as_deref(), Some("Page 1 of 7"));

        let rows = page.rows.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 9);
        assert_eq!(rows[0][1].link_text.as_deref(), Some("0xhash1"));
        assert_eq!(rows[0][6].span_text.as_deref(), Some("Transfer"));
        assert_eq!(
            rows[0][7].link_href.as_deref(),
            Some("/address/0xfrom1#tokentxns")
        );
        assert_eq!(rows[1].len(), 1);
    }

    #[test]
    fn test_parse_page_without_table() {
        let page = ListingParser::new()
            .unwrap()
            .parse("<html><body><p>Maintenance</p></body></html>");
        assert!(page.rows.is_none());
        assert!(page.pagination_text.is_none());
    }
}
