//! Progress reporting hooks for transfer operations

use std::fmt;

/// Data phase of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// File to device
    Writing,
    /// Device to file
    Reading,
    /// Device compared against file
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writing => write!(f, "Writing"),
            Self::Reading => write!(f, "Reading"),
            Self::Verifying => write!(f, "Checking"),
        }
    }
}

/// Statistics from a successful transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Payload bytes written, read or compared
    pub bytes: u64,
    /// Erase blocks erased before writing
    pub erased_blocks: u64,
}

/// Callback for progress reporting during transfers
pub trait TransferProgress {
    /// Called before the first block is erased
    fn erasing(&mut self, blocks_to_erase: u64, bytes_to_erase: u64);

    /// Called after each block is erased
    fn erase_progress(&mut self, blocks_erased: u64);

    /// Called when the data phase starts
    fn transferring(&mut self, phase: Phase, total_bytes: u64);

    /// Called after each chunk
    fn transfer_progress(&mut self, bytes_done: u64);

    /// Called when the operation is complete
    fn complete(&mut self, stats: &TransferStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn erasing(&mut self, _blocks_to_erase: u64, _bytes_to_erase: u64) {}
    fn erase_progress(&mut self, _blocks_erased: u64) {}
    fn transferring(&mut self, _phase: Phase, _total_bytes: u64) {}
    fn transfer_progress(&mut self, _bytes_done: u64) {}
    fn complete(&mut self, _stats: &TransferStats) {}
}
