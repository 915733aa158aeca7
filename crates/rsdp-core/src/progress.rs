//! Transfer progress reporting

/// Progress callbacks for a file download to the device
pub trait TransferProgress {
    /// Called before the first chunk is sent
    fn start(&mut self, total_bytes: usize);

    /// Called after each chunk with the running total
    fn advance(&mut self, bytes_sent: usize);

    /// Called once the device acknowledged the transfer
    fn finish(&mut self);
}

/// A no-op progress reporter
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn start(&mut self, _total_bytes: usize) {}
    fn advance(&mut self, _bytes_sent: usize) {}
    fn finish(&mut self) {}
}
