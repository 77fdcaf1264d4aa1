use common::error::CorrelationError;
use common::types::WalletCounterparties;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counterparties must be seen under at least this many distinct wallets.
pub const MIN_SHARED_WALLETS: usize = 2;

/// Counterparty -> distinct wallets that observed it.
///
/// Insertion is a set union, so observing the same wallet twice, or feeding
/// wallets in a different order, yields the same index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationIndex {
    by_counterparty: BTreeMap<String, BTreeSet<String>>,
}

impl CorrelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one wallet's counterparty set. Input is validated before anything
    /// is inserted, so a rejected observation leaves the index untouched.
    pub fn observe(&mut self, observed: &WalletCounterparties) -> Result<(), CorrelationError> {
        if observed.wallet.trim().is_empty() {
            return Err(CorrelationError::EmptyWallet);
        }
        if observed.counterparties.iter().any(|c| c.trim().is_empty()) {
            return Err(CorrelationError::EmptyCounterparty {
                wallet: observed.wallet.clone(),
            });
        }
        for counterparty in &observed.counterparties {
            self.by_counterparty
                .entry(counterparty.clone())
                .or_default()
                .insert(observed.wallet.clone());
        }
        Ok(())
    }

    pub fn wallets_for(&self, counterparty: &str) -> Option<&BTreeSet<String>> {
        self.by_counterparty.get(counterparty)
    }

    pub fn len(&self) -> usize {
        self.by_counterparty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_counterparty.is_empty()
    }

    /// Keeps only counterparties shared by [`MIN_SHARED_WALLETS`] or more wallets.
    pub fn into_result(self) -> CorrelationResult {
        let entries = self
            .by_counterparty
            .into_iter()
            .filter(|(_, wallets)| wallets.len() >= MIN_SHARED_WALLETS)
            .collect();
        CorrelationResult { entries }
    }
}

/// Counterparties shared across wallets. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CorrelationResult {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl CorrelationResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, counterparty: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(counterparty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.entries.iter()
    }
}

/// Builds the index from every wallet's counterparty set and filters it.
pub fn correlate<'a, I>(observations: I) -> Result<CorrelationResult, CorrelationError>
where
    I: IntoIterator<Item = &'a WalletCounterparties>,
{
    let mut index = CorrelationIndex::new();
    for observed in observations {
        index.observe(observed)?;
    }
    Ok(index.into_result())
}
