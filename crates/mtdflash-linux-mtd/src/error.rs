//! Error types for Linux MTD operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Linux MTD-specific errors
#[derive(Debug, Error)]
pub enum LinuxMtdError {
    /// The device node could not be opened
    #[error("Can't open MTD device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The MTD ioctl ABI only carries 32-bit offsets and lengths
    #[error("Offset or length {0:#x} does not fit the 32-bit MTD ioctl interface")]
    OutOfRange(u64),

    /// An MTD ioctl failed
    #[error("{request} failed: {source}")]
    Ioctl {
        request: &'static str,
        #[source]
        source: nix::errno::Errno,
    },
}

impl From<LinuxMtdError> for io::Error {
    fn from(err: LinuxMtdError) -> Self {
        match err {
            LinuxMtdError::Open { source, .. } => source,
            LinuxMtdError::OutOfRange(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            LinuxMtdError::Ioctl { source, .. } => {
                io::Error::new(io::Error::from(source).kind(), err)
            }
        }
    }
}

impl From<LinuxMtdError> for mtdflash_core::Error {
    fn from(err: LinuxMtdError) -> Self {
        match err {
            LinuxMtdError::Open { path, source } => mtdflash_core::Error::DeviceOpen { path, source },
            other => mtdflash_core::Error::DeviceInfo(other.into()),
        }
    }
}

/// Result type for Linux MTD operations
pub type Result<T> = std::result::Result<T, LinuxMtdError>;
