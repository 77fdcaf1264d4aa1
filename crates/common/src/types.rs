use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stands in for a transaction hash or link the listing did not expose.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
        }
    }

    /// Column label for the counterparty address in reports.
    pub fn counterparty_label(&self) -> &'static str {
        match self {
            Self::Ethereum => "From Address",
            Self::Solana => "Signer",
        }
    }
}

/// Accepted row from the token-transfer listing of one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub wallet: String,
    pub tx_hash: String,
    pub tx_link: String,
    pub counterparty: String,
    pub method: String,
    pub status: String,
}

/// Valid transfer returned by the cursor endpoint for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub wallet: String,
    pub tx_hash: String,
    pub signers: Vec<String>,
}

/// Distinct counterparties observed for one input wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCounterparties {
    pub wallet: String,
    pub counterparties: BTreeSet<String>,
}

impl WalletCounterparties {
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            counterparties: BTreeSet::new(),
        }
    }

    pub fn from_records(wallet: &str, records: &[TransactionRecord]) -> Self {
        Self {
            wallet: wallet.to_string(),
            counterparties: records.iter().map(|r| r.counterparty.clone()).collect(),
        }
    }
}

/// One parsed page of the HTML listing, reduced to what the ingestor reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Text of the pagination indicator, e.g. "Page 1 of 12".
    pub pagination_text: Option<String>,
    /// `None` when the page carried no listing table at all.
    pub rows: Option<Vec<ListingRow>>,
}

pub type ListingRow = Vec<ListingCell>;

/// A `<td>` cell: first link and first span, both trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCell {
    pub link_text: Option<String>,
    pub link_href: Option<String>,
    pub span_text: Option<String>,
}

/// Body of the cursor-paginated transaction endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTransactionPage {
    #[serde(default)]
    pub success: bool,
    pub data: Option<ApiTransactionData>,
}

impl ApiTransactionPage {
    /// Raw transactions, or `None` when the endpoint reported no data.
    pub fn transactions(&self) -> Option<&[ApiTransaction]> {
        if !self.success {
            return None;
        }
        self.data.as_ref()?.transactions.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTransactionData {
    pub transactions: Option<Vec<ApiTransaction>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTransaction {
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    #[serde(rename = "parsedInstruction")]
    pub parsed_instruction: Option<Vec<ApiInstruction>>,
    #[serde(default)]
    pub signer: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiInstruction {
    #[serde(rename = "type")]
    pub instruction_type: Option<String>,
}
