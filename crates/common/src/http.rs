use crate::config::Http;
use crate::error::FetchError;
use std::time::Duration;
use tracing::warn;

/// Upstream bodies longer than this are cut before they land in errors or logs.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
        }
    }
}

impl From<&Http> for RetryPolicy {
    fn from(http: &Http) -> Self {
        Self {
            max_retries: http.max_retries,
            backoff_base: http.backoff_base(),
        }
    }
}

pub fn build_client(http: &Http) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(http.timeout())
        .user_agent(http.user_agent.clone())
        .build()?)
}

/// Sends the request built by `build`, retrying transient failures with
/// doubling backoff. Non-retryable failures return immediately.
pub async fn get_text_with_retry<F>(
    policy: RetryPolicy,
    endpoint: &'static str,
    mut build: F,
) -> Result<String, FetchError>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut backoff = policy.backoff_base;
    let mut attempt = 0_u32;
    loop {
        match send_once(build()).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt < policy.max_retries && e.kind().is_retryable() => {
                attempt += 1;
                warn!(
                    endpoint,
                    attempt,
                    kind = e.kind().as_str(),
                    error = %e,
                    wait_for = ?backoff,
                    "upstream request failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once(request: reqwest::RequestBuilder) -> Result<String, FetchError> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status,
            body: truncate(body),
        });
    }
    Ok(resp.text().await?)
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        body.truncate(idx);
    }
    body
}
