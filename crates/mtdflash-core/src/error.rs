//! Error types for mtdflash-core
//!
//! Every stage of a transfer pipeline (open, info, erase, read, write,
//! verify) has its own variant so the caller can tell exactly where an
//! operation stopped. Nothing here is recovered internally.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Direction of a device transfer, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    /// Reading from the flash device
    Read,
    /// Writing to the flash device
    Write,
    /// Moving the device cursor
    Seek,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Seek => write!(f, "seek"),
        }
    }
}

/// Which half of a block erase failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseStep {
    /// The unlock request preceding the erase
    Unlock,
    /// The erase request itself
    Erase,
}

impl fmt::Display for EraseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlock => write!(f, "unlock"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

/// Why a size check rejected a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeProblem {
    /// The file is empty
    Empty,
    /// The file (plus any header) does not fit in the partition
    ExceedsCapacity {
        /// Bytes the transfer needs on the device
        required: u64,
        /// Partition size in bytes
        capacity: u64,
    },
    /// The file size differs from the size recorded on the device
    Mismatch {
        /// Size of the local file
        file: u64,
        /// Size declared by the framed header
        declared: u64,
    },
}

impl fmt::Display for SizeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "file is empty"),
            Self::ExceedsCapacity { required, capacity } => write!(
                f,
                "{} bytes required but the partition holds only {} bytes",
                required, capacity
            ),
            Self::Mismatch { file, declared } => write!(
                f,
                "file is {} bytes but the partition declares {} bytes",
                file, declared
            ),
        }
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The partition device could not be opened
    #[error("can't open device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The device did not report usable geometry
    #[error("can't query device info: {0}")]
    DeviceInfo(#[source] io::Error),

    /// A local file could not be opened or created
    #[error("can't open file {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or writing a local file failed
    #[error("I/O error on file {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A size bound was violated before the transfer started
    #[error("invalid size: {0}")]
    SizeInvalid(SizeProblem),

    /// Erasing (or unlocking) a block failed; earlier blocks stay erased
    #[error("{step} failed at offset {offset:#x}: {source}")]
    Erase {
        offset: u64,
        step: EraseStep,
        #[source]
        source: io::Error,
    },

    /// The device returned an error for a read, write or seek
    #[error("device {op} at offset {offset:#x} failed: {source}")]
    DeviceIo {
        op: IoOp,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The device transferred fewer bytes than requested
    #[error("short device {op} at offset {offset:#x}: {actual} of {expected} bytes")]
    ShortTransfer {
        op: IoOp,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// The chunk loop finished with a byte count different from the file size
    #[error("incorrect transfer: {transferred} bytes processed, expected {expected}")]
    TransferIncomplete { transferred: u64, expected: u64 },

    /// Device and file contents differ
    #[error(
        "data differs at offset {offset}: expected 0x{expected:02X}, found 0x{actual:02X}"
    )]
    VerifyMismatch { offset: u64, expected: u8, actual: u8 },

    /// The framed header declares more data than the partition can hold
    #[error("header declares {declared} bytes, more than the partition payload capacity ({capacity} bytes)")]
    HeaderSizeInvalid { declared: u64, capacity: u64 },

    /// No partition with this name was discovered
    #[error("partition '{0}' doesn't exist")]
    NotFound(String),
}

impl Error {
    /// The mismatching byte offset, if this is a verify failure
    pub fn mismatch_offset(&self) -> Option<u64> {
        match self {
            Self::VerifyMismatch { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
