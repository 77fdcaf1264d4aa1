use thiserror::Error;

/// Largest per-wallet target count a request may ask for.
pub const MAX_TARGET_COUNT: u32 = 10_000;

/// Rejected before any ingestion starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no wallet addresses supplied")]
    NoWallets,
    #[error("target count must be between 1 and {MAX_TARGET_COUNT}, got {0}")]
    InvalidTargetCount(u32),
}

/// One failed request against an upstream explorer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Transport,
    Timeout,
    RateLimited,
    Http4xx,
    Http5xx,
    Decode,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Decode => "decode",
        }
    }

    /// Worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport | Self::Timeout | Self::RateLimited | Self::Http5xx
        )
    }
}

impl FetchError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Transport(e) if e.is_timeout() => ApiErrorKind::Timeout,
            Self::Transport(e) if e.is_decode() => ApiErrorKind::Decode,
            Self::Transport(_) => ApiErrorKind::Transport,
            Self::Status { status, .. } if status.as_u16() == 429 => ApiErrorKind::RateLimited,
            Self::Status { status, .. } if status.is_server_error() => ApiErrorKind::Http5xx,
            Self::Status { .. } => ApiErrorKind::Http4xx,
            Self::Decode(_) => ApiErrorKind::Decode,
        }
    }
}

/// Malformed input handed to the correlation engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("empty wallet address in correlation input")]
    EmptyWallet,
    #[error("empty counterparty address observed for wallet {wallet}")]
    EmptyCounterparty { wallet: String },
}
