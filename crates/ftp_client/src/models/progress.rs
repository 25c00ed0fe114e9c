use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// Consumer of percentage updates for a running download
pub trait ProgressSink: Send + Sync {
    /// Called once per received chunk while progress reporting is enabled
    fn report(&self, percent: f64);

    /// Called once after a transfer completed
    fn finish(&self) {}

    /// Called when a transfer fails or is cancelled after it started
    fn abandon(&self) {}
}

/// Byte accounting for a single in-flight transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    accumulated: u64,
    total: u64,
}

impl TransferProgress {
    pub fn new(total: u64) -> Self {
        Self {
            accumulated: 0,
            total,
        }
    }

    /// Count a received chunk and return the new percentage
    pub fn advance(&mut self, chunk_len: u64) -> f64 {
        self.accumulated += chunk_len;
        self.percent()
    }

    /// Percentage of the declared size received so far. A declared size of
    /// zero counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.accumulated as f64 * 100.0 / self.total as f64
    }

    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// More bytes arrived than the server declared
    pub fn overrun(&self) -> bool {
        self.accumulated > self.total
    }
}

/// Render a percentage with two fraction digits
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Single-line console progress, overwritten in place
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn create_bar() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, percent: f64) {
        if let Ok(mut guard) = self.bar.lock() {
            guard
                .get_or_insert_with(Self::create_bar)
                .set_message(format_percent(percent));
        }
    }

    fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish();
            }
        }
    }

    fn abandon(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.abandon();
            }
        }
    }
}
