use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "correlator_api_requests_total",
        "Number of explorer requests made."
    );
    describe_counter!(
        "correlator_api_errors_total",
        "Number of explorer requests that failed after retries."
    );
    describe_histogram!(
        "correlator_api_latency_ms",
        "Explorer request latency in milliseconds, retries included."
    );
    describe_counter!(
        "correlator_pages_skipped_total",
        "Listing pages skipped because they failed or had no table."
    );
    describe_counter!(
        "correlator_records_accepted_total",
        "Records that passed ingestion filters."
    );
    describe_counter!(
        "correlator_wallets_scanned_total",
        "Wallets whose ingestion finished."
    );
    describe_gauge!(
        "correlator_correlated_counterparties",
        "Counterparties shared by two or more wallets in the last run."
    );
    describe_counter!("tracing_error_events", "ERROR-level log events.");
}

pub fn install_prometheus(port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    Ok(PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?)
}
