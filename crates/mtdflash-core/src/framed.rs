//! Framed file transfer
//!
//! A framed partition holds a file smaller than the partition, prefixed by
//! an 8-byte header so the size can be recovered on read-back:
//!
//! ```text
//! 0..4   declared payload size (u32, little endian)
//! 4..8   copy of the declared size (u32, little endian)
//! 8..    payload
//! ```
//!
//! The second field has always been written as a copy of the first. Older
//! partitions depend on that, so it is kept as-is and never checked as an
//! integrity value.

use crate::device::{erase_range, query_info, DeviceCursor, FlashDevice, FlashInfo};
use crate::error::{Error, Result, SizeProblem};
use crate::progress::{TransferProgress, TransferStats};
use crate::transfer::{
    check_fits, compare, copy_from_device, copy_to_device, expect_total, open_file,
    TransferConfig,
};
use log::{debug, info, warn};
use std::fs::File;
use std::path::Path;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of the on-device header
pub const HEADER_LEN: usize = 8;

/// On-device header of a framed partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TransferHeader {
    declared_size: U32,
    duplicate: U32,
}

impl TransferHeader {
    /// Header for a payload of `size` bytes
    pub fn new(size: u32) -> Self {
        Self {
            declared_size: U32::new(size),
            duplicate: U32::new(size),
        }
    }

    /// Decode the first 8 bytes of a partition
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        zerocopy::transmute!(bytes)
    }

    /// Encode for writing at offset 0
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        zerocopy::transmute!(*self)
    }

    /// Payload size in bytes
    pub fn declared_size(&self) -> u32 {
        self.declared_size.get()
    }

    /// Raw value of the second field
    pub fn duplicate(&self) -> u32 {
        self.duplicate.get()
    }
}

fn payload_capacity(info: &FlashInfo) -> u64 {
    info.total_size.saturating_sub(HEADER_LEN as u64)
}

/// Read and bound-check the header at offset 0
fn read_header<D>(cursor: &mut DeviceCursor<'_, D>, info: &FlashInfo) -> Result<TransferHeader>
where
    D: FlashDevice + ?Sized,
{
    let mut bytes = [0u8; HEADER_LEN];
    cursor.read_chunk(&mut bytes)?;
    let header = TransferHeader::from_bytes(bytes);

    debug!(
        "Header: declared_size={}, duplicate={}",
        header.declared_size(),
        header.duplicate()
    );
    if header.duplicate() != header.declared_size() {
        warn!(
            "Header fields disagree ({} vs {}), using the first",
            header.declared_size(),
            header.duplicate()
        );
    }

    let declared = u64::from(header.declared_size());
    let capacity = payload_capacity(info);
    if declared > capacity {
        return Err(Error::HeaderSizeInvalid { declared, capacity });
    }

    Ok(header)
}

/// Erase, write the header, then stream `source` after it
///
/// Requires `0 < len(source)` and `len(source) + 8 <= partition size`.
/// The erase covers header and payload together.
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
    check_fits(size, HEADER_LEN as u64, info.total_size)?;
    let declared = u32::try_from(size).map_err(|_| {
        Error::SizeInvalid(SizeProblem::ExceedsCapacity {
            required: size + HEADER_LEN as u64,
            capacity: u64::from(u32::MAX),
        })
    })?;

    if !info.is_writable() {
        warn!("Device is not flagged writable, the write will probably fail");
    }

    info!("Erasing...");
    let erased_blocks = erase_range(device, &info, 0, size + HEADER_LEN as u64, progress)?;

    info!("Writing {} bytes from {}...", size, source.display());
    let mut cursor = DeviceCursor::rewind(device)?;
    cursor.write_chunk(&TransferHeader::new(declared).to_bytes())?;
    let written = copy_to_device(&mut file, source, &mut cursor, size, config, progress)?;
    expect_total(written, size)?;

    let stats = TransferStats {
        bytes: written,
        erased_blocks,
    };
    progress.complete(&stats);
    info!("{} bytes written. File data is {}.", written, size);
    Ok(stats)
}

/// Read the framed payload into `dest`
///
/// The header is validated before `dest` is created, so a bad header
/// leaves `dest` untouched.
pub fn read<D, P>(
    device: &mut D,
    dest: &Path,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<TransferStats>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let info = query_info(device)?;
    let mut cursor = DeviceCursor::rewind(device)?;
    let header = read_header(&mut cursor, &info)?;
    let size = u64::from(header.declared_size());

    let mut file = File::create(dest).map_err(|source| Error::FileOpen {
        path: dest.to_path_buf(),
        source,
    })?;

    info!("Reading {} bytes into {}...", size, dest.display());
    let read = copy_from_device(&mut cursor, &mut file, dest, size, config, progress)?;
    expect_total(read, size)?;

    let stats = TransferStats {
        bytes: read,
        erased_blocks: 0,
    };
    progress.complete(&stats);
    info!("{} bytes read", read);
    Ok(stats)
}

/// Compare the framed payload with `file`
///
/// The file size must equal the declared size exactly. Mismatch offsets are
/// relative to the start of the payload.
pub fn verify<D, P>(
    device: &mut D,
    path: &Path,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<TransferStats>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let info = query_info(device)?;
    let mut cursor = DeviceCursor::rewind(device)?;
    let header = read_header(&mut cursor, &info)?;
    let declared = u64::from(header.declared_size());

    let (mut file, size) = open_file(path)?;
    if size == 0 {
        return Err(Error::SizeInvalid(SizeProblem::Empty));
    }
    if size != declared {
        return Err(Error::SizeInvalid(SizeProblem::Mismatch {
            file: size,
            declared,
        }));
    }

    info!("Checking {} bytes against {}...", size, path.display());
    let checked = compare(&mut file, path, &mut cursor, size, config, progress)?;
    expect_total(checked, size)?;

    let stats = TransferStats {
        bytes: checked,
        erased_blocks: 0,
    };
    progress.complete(&stats);
    info!("{} bytes checked, data is the same", checked);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = TransferHeader::new(0x0001_0203);
        assert_eq!(
            header.to_bytes(),
            [0x03, 0x02, 0x01, 0x00, 0x03, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_header_decode() {
        let header = TransferHeader::from_bytes([0x10, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(header.declared_size(), 0x10);
        assert_eq!(header.duplicate(), 0xDDCC_BBAA);
    }

    #[test]
    fn test_erased_header_declares_too_much() {
        let header = TransferHeader::from_bytes([0xFF; HEADER_LEN]);
        let info = FlashInfo::new(0x10000, 0x1000);
        assert!(u64::from(header.declared_size()) > payload_capacity(&info));
    }
}
