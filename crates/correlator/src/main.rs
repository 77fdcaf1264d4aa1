use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use correlator::cli::{self, Cli, Command};
use correlator::ingestion::IngestSettings;
use correlator::pipeline::{self, RunRequest};
use correlator::progress::TracingProgress;
use correlator::{export, metrics};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = common::config::Config::load_from(&cli.config)?;

    let (dispatch, _otel_guard) = common::observability::build_dispatch(
        "correlator",
        &config.general.log_level,
        config.general.log_format,
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    if let Some(port) = config.observability.prometheus_port {
        metrics::install_prometheus(port)?;
        tracing::info!(port, "prometheus exporter listening");
    }
    metrics::describe();

    let args = cli.command.args();
    let chain = cli.command.chain();
    let wallets = cli::read_wallets(&args.wallets)?;
    let concurrency = args
        .concurrency
        .unwrap_or(config.run.wallet_concurrency)
        .max(1);
    tracing::info!(
        chain = chain.as_str(),
        wallets = wallets.len(),
        target = args.target,
        concurrency,
        "wallet correlator starting"
    );

    // Ctrl-C stops the run; whatever was collected so far is still reported.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing with partial results");
                cancel.cancel();
            }
        });
    }

    let outcome = match &cli.command {
        Command::Ethereum(_) => {
            let client =
                common::etherscan::EtherscanClient::new(&config.etherscan, &config.http)?;
            let request = RunRequest {
                wallets,
                settings: IngestSettings::for_page_source(&config.etherscan, args.target),
                concurrency,
            };
            pipeline::run_page_source(&client, &request, &TracingProgress, &cancel).await?
        }
        Command::Solana(_) => {
            let client = common::solscan::SolscanClient::new(&config.solscan, &config.http)?;
            let request = RunRequest {
                wallets,
                settings: IngestSettings::for_cursor_api(&config.solscan, args.target),
                concurrency,
            };
            pipeline::run_cursor_api(&client, &request, &TracingProgress, &cancel).await?
        }
    };

    print!("{}", export::render_summary(&outcome));

    let path = args
        .out
        .clone()
        .unwrap_or_else(|| export::default_export_name(chain, args.format).into());
    export::export(&path, args.format, &outcome)?;
    tracing::info!(path = %path.display(), "report written");

    Ok(())
}
