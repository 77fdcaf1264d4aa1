pub mod cli;
pub mod correlation;
pub mod export;
pub mod fetcher_impls;
pub mod ingestion;
pub mod metrics;
pub mod pipeline;
pub mod progress;
