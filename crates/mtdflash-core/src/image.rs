//! Whole-partition image transfer
//!
//! An image is written from offset 0 with no framing. Its length is not
//! recorded on the device, so verifying needs the source file.

use crate::device::{erase_range, query_info, DeviceCursor, FlashDevice};
use crate::error::Result;
use crate::progress::{TransferProgress, TransferStats};
use crate::transfer::{check_fits, compare, copy_to_device, expect_total, open_file, TransferConfig};
use log::{info, warn};
use std::path::Path;

/// Erase the partition and write `source` to it from offset 0
///
/// The file must be non-empty and no larger than the partition. The size
/// check happens before any erase or write call.
pub fn write<D, P>(
    device: &mut D,
    source: &Path,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<TransferStats>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let info = query_info(device)?;
    let (mut file, size) = open_file(source)?;
    check_fits(size, 0, info.total_size)?;

    if !info.is_writable() {
        warn!("Device is not flagged writable, the write will probably fail");
    }

    info!("Erasing...");
    let erased_blocks = erase_range(device, &info, 0, size, progress)?;

    info!("Writing {} bytes from {}...", size, source.display());
    let mut cursor = DeviceCursor::rewind(device)?;
    let written = copy_to_device(&mut file, source, &mut cursor, size, config, progress)?;
    expect_total(written, size)?;

    let stats = TransferStats {
        bytes: written,
        erased_blocks,
    };
    progress.complete(&stats);
    info!("{} bytes written. File size is {}.", written, size);
    Ok(stats)
}

/// Compare the partition contents with `source`, starting at offset 0
///
/// Only the first `len(source)` bytes of the partition are compared.
pub fn verify<D, P>(
    device: &mut D,
    source: &Path,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<TransferStats>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let info = query_info(device)?;
    let (mut file, size) = open_file(source)?;
    check_fits(size, 0, info.total_size)?;

    info!("Checking {} bytes against {}...", size, source.display());
    let mut cursor = DeviceCursor::rewind(device)?;
    let checked = compare(&mut file, source, &mut cursor, size, config, progress)?;
    expect_total(checked, size)?;

    let stats = TransferStats {
        bytes: checked,
        erased_blocks: 0,
    };
    progress.complete(&stats);
    info!("{} bytes checked, data is the same", checked);
    Ok(stats)
}
