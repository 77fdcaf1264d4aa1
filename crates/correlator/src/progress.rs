use std::sync::{Mutex, PoisonError};

/// Receives fractional progress and a status line. Fire-and-forget.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64, message: &str);
}

/// Logs progress events through `tracing`.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, fraction: f64, message: &str) {
        tracing::info!(progress = fraction, "{message}");
    }
}

/// Run-wide progress over a fixed number of wallets.
///
/// Each wallet reports a local fraction in `[0, 1]` through its
/// [`WalletProgress`]; that is mapped onto the wallet's slice of the run and
/// clamped so the overall fraction never moves backwards, even when several
/// wallets are scanned at once.
pub struct RunProgress<'a> {
    sink: &'a dyn ProgressSink,
    total_wallets: usize,
    high_water: Mutex<f64>,
}

impl<'a> RunProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total_wallets: usize) -> Self {
        Self {
            sink,
            total_wallets: total_wallets.max(1),
            high_water: Mutex::new(0.0),
        }
    }

    pub fn wallet(&self, index: usize) -> WalletProgress<'_> {
        WalletProgress { run: self, index }
    }

    pub fn total_wallets(&self) -> usize {
        self.total_wallets
    }

    fn emit(&self, fraction: f64, message: &str) {
        let mut high = self
            .high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if fraction > *high {
            *high = fraction.min(1.0);
        }
        let current = *high;
        drop(high);
        self.sink.report(current, message);
    }
}

pub struct WalletProgress<'a> {
    run: &'a RunProgress<'a>,
    index: usize,
}

impl ProgressSink for WalletProgress<'_> {
    fn report(&self, fraction: f64, message: &str) {
        let local = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss)]
        let overall = (self.index as f64 + local) / self.run.total_wallets as f64;
        self.run.emit(overall, message);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_wallet_fraction_maps_into_run_slice() {
        let sink = RecordingProgress::default();
        let run = RunProgress::new(&sink, 4);
        run.wallet(1).report(0.5, "half of wallet 2");
        run.wallet(3).report(1.0, "last wallet done");
        assert_eq!(sink.fractions(), vec![0.375, 1.0]);
    }

    #[test]
    fn test_progress_never_goes_backwards() {
        let sink = RecordingProgress::default();
        let run = RunProgress::new(&sink, 2);
        run.wallet(1).report(0.5, "second wallet first");
        run.wallet(0).report(1.0, "first wallet finishes later");
        let fractions = sink.fractions();
        assert_eq!(fractions, vec![0.75, 0.75]);
        assert_eq!(sink.messages()[1], "first wallet finishes later");
    }

    #[test]
    fn test_out_of_range_fractions_are_clamped() {
        let sink = RecordingProgress::default();
        let run = RunProgress::new(&sink, 1);
        run.wallet(0).report(f64::NAN, "nan");
        run.wallet(0).report(7.0, "overshoot");
        assert_eq!(sink.fractions(), vec![0.0, 1.0]);
    }
}
