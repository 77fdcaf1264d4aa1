pub mod cursor_api;
pub mod page_source;

use common::config::{Etherscan, Solscan};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Knobs shared by both ingestors for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    /// Per-wallet cap on accepted (post-filter) records.
    pub target_count: u32,
    pub page_size: u32,
    pub pacing_delay: Duration,
    /// Listing rows with this method tag are dropped (case-insensitive).
    pub excluded_method: String,
    /// Only transactions whose first instruction carries this type are kept.
    pub transfer_instruction_type: String,
}

impl IngestSettings {
    pub fn for_page_source(cfg: &Etherscan, target_count: u32) -> Self {
        Self {
            target_count,
            page_size: cfg.page_size,
            pacing_delay: Duration::from_millis(cfg.pacing_delay_ms),
            excluded_method: cfg.excluded_method.clone(),
            transfer_instruction_type: String::new(),
        }
    }

    pub fn for_cursor_api(cfg: &Solscan, target_count: u32) -> Self {
        Self {
            target_count,
            page_size: cfg.page_size,
            pacing_delay: Duration::from_millis(cfg.pacing_delay_ms),
            excluded_method: String::new(),
            transfer_instruction_type: cfg.transfer_instruction_type.clone(),
        }
    }

    pub fn target(&self) -> usize {
        self.target_count as usize
    }
}

/// Waits out the pacing delay between two upstream requests.
/// Returns `false` if the run was cancelled first.
pub async fn pace(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
