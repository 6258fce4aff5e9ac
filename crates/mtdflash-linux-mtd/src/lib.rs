//! mtdflash-linux-mtd - Linux MTD (Memory Technology Device) backend
//!
//! This crate implements [`mtdflash_core::FlashDevice`] for the character
//! devices the kernel exposes at `/dev/mtdN`. Geometry comes from the
//! `MEMGETINFO` ioctl, erasing goes through `MEMUNLOCK` + `MEMERASE`, and
//! data moves with plain sequential `read(2)`/`write(2)` on the node.
//!
//! # System Requirements
//!
//! - Linux kernel with MTD support (`CONFIG_MTD`, `CONFIG_MTD_CHAR`)
//! - Read/write access to `/dev/mtdN` device
//! - May require root access or udev rules
//!
//! # Device Discovery
//!
//! Partitions are listed in `/proc/mtd`, which `mtdflash-core` parses:
//! ```bash
//! cat /proc/mtd
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::LinuxMtd;
pub use error::{LinuxMtdError, Result};

/// Open a partition device by path, with errors in the core taxonomy
///
/// This is a convenience function for use in the CLI command dispatch.
pub fn open_mtd(
    path: &std::path::Path,
    mode: mtdflash_core::OpenMode,
) -> mtdflash_core::Result<LinuxMtd> {
    Ok(LinuxMtd::open(path, mode)?)
}
