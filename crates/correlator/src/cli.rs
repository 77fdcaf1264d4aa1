use crate::export::ExportFormat;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::types::Chain;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "correlator",
    about = "Find counterparties shared by a set of wallets"
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, default_value = common::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape token-transfer listings and correlate on sender addresses.
    Ethereum(ScanArgs),
    /// Walk the account transaction API and correlate on signers.
    Solana(ScanArgs),
}

impl Command {
    pub fn chain(&self) -> Chain {
        match self {
            Self::Ethereum(_) => Chain::Ethereum,
            Self::Solana(_) => Chain::Solana,
        }
    }

    pub fn args(&self) -> &ScanArgs {
        match self {
            Self::Ethereum(args) | Self::Solana(args) => args,
        }
    }
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// File with one wallet address per line, or `-` for stdin.
    #[arg(long)]
    pub wallets: String,

    /// Accepted records to collect per wallet.
    #[arg(long, default_value_t = 100)]
    pub target: u32,

    /// Export path. Defaults to `<chain>_analysis.<format>`.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,

    /// Wallets scanned at once; overrides `run.wallet_concurrency`.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// One address per line; surrounding whitespace and blank lines are dropped.
pub fn parse_wallet_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_wallets(source: &str) -> Result<Vec<String>> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read wallets from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read wallet file {source}"))?
    };
    Ok(parse_wallet_list(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_solana_subcommand() {
        let cli = Cli::try_parse_from([
            "correlator",
            "solana",
            "--wallets",
            "w.txt",
            "--target",
            "25",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.command.chain(), Chain::Solana);
        let args = cli.command.args();
        assert_eq!(args.target, 25);
        assert_eq!(args.format, ExportFormat::Json);
        assert!(args.out.is_none());
        assert_eq!(cli.config, PathBuf::from(common::config::DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_defaults_for_ethereum() {
        let cli = Cli::try_parse_from([
            "correlator",
            "--config",
            "custom.toml",
            "ethereum",
            "--wallets",
            "-",
        ])
        .unwrap();
        assert_eq!(cli.command.chain(), Chain::Ethereum);
        assert_eq!(cli.command.args().target, 100);
        assert_eq!(cli.command.args().format, ExportFormat::Csv);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }

    #[test]
    fn test_missing_wallets_is_rejected() {
        assert!(Cli::try_parse_from(["correlator", "ethereum"]).is_err());
        assert!(Cli::try_parse_from(["correlator", "bitcoin", "--wallets", "x"]).is_err());
    }

    #[test]
    fn test_parse_wallet_list_trims_and_drops_blanks() {
        let wallets = parse_wallet_list("  0xabc \n\n\t\n0xdef\r\n");
        assert_eq!(wallets, vec!["0xabc", "0xdef"]);
    }

    #[test]
    fn test_read_wallets_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "W1\n\nW2").unwrap();
        let wallets = read_wallets(file.path().to_str().unwrap()).unwrap();
        assert_eq!(wallets, vec!["W1", "W2"]);
    }

    #[test]
    fn test_read_wallets_missing_file() {
        let err = read_wallets("/definitely/not/here.txt").unwrap_err();
        assert!(err.to_string().contains("failed to read wallet file"));
    }
}
