//! Download progress bars

use indicatif::{ProgressBar, ProgressStyle};
use rsdp_core::TransferProgress;

fn bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}

/// Progress reporter using an indicatif progress bar
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }

    /// Factory for `NusbBus::with_progress`
    pub fn boxed() -> Box<dyn TransferProgress> {
        Box::new(Self::new())
    }

    /// Leave an unfinished bar on screen where the transfer stopped
    fn abandon(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon();
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress for IndicatifProgress {
    fn start(&mut self, total_bytes: usize) {
        self.abandon();
        let pb = ProgressBar::new(total_bytes as u64);
        pb.set_style(bar_style().unwrap_or_else(|_| ProgressStyle::default_bar()));
        self.bar = Some(pb);
    }

    fn advance(&mut self, bytes_sent: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_sent as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("Write complete");
        }
    }
}
