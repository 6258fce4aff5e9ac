//! Flash device abstraction
//!
//! [`FlashDevice`] is the small set of capability calls the transfer
//! pipeline needs from a partition: geometry, unlock, erase and sequential
//! cursor-based I/O. The Linux backend maps these onto the MTD ioctls and
//! the character device; the dummy backend emulates them in memory.

use crate::error::{EraseStep, Error, IoOp, Result};
use crate::progress::TransferProgress;
use bitflags::bitflags;
use log::{debug, trace};
use std::io;

bitflags! {
    /// MTD device flags, as reported by the kernel
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MtdFlags: u32 {
        /// Device is writable
        const WRITEABLE     = 0x400;
        /// Single bits can be flipped
        const BIT_WRITEABLE = 0x800;
        /// No erase necessary (RAM-backed devices)
        const NO_ERASE      = 0x1000;
        /// Power-up write protection
        const POWERUP_LOCK  = 0x2000;
    }
}

impl Default for MtdFlags {
    fn default() -> Self {
        MtdFlags::WRITEABLE
    }
}

/// Geometry of an open partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashInfo {
    /// Partition size in bytes
    pub total_size: u64,
    /// Minimum erase unit in bytes
    pub erase_block_size: u64,
    /// Device flags
    pub flags: MtdFlags,
}

impl FlashInfo {
    /// Create info for a writable device that requires erasing
    pub fn new(total_size: u64, erase_block_size: u64) -> Self {
        Self {
            total_size,
            erase_block_size,
            flags: MtdFlags::default(),
        }
    }

    /// Whether the kernel reports the device as writable
    pub fn is_writable(&self) -> bool {
        self.flags.contains(MtdFlags::WRITEABLE)
    }

    /// Whether blocks must be erased before they are written
    pub fn requires_erase(&self) -> bool {
        !self.flags.contains(MtdFlags::NO_ERASE)
    }
}

/// How a partition device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read and verify operations
    ReadOnly,
    /// Write operations
    ReadWrite,
}

/// Capability interface of a raw flash partition
///
/// `read` and `write` work from the device's current position and return
/// the number of bytes transferred. Callers never retry: a count shorter
/// than requested is fatal.
pub trait FlashDevice {
    /// Query the partition geometry
    fn info(&mut self) -> io::Result<FlashInfo>;

    /// Remove write protection from a block range
    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()>;

    /// Erase a block range (block aligned)
    fn erase(&mut self, start: u64, len: u64) -> io::Result<()>;

    /// Move the cursor back to offset 0
    fn rewind(&mut self) -> io::Result<()>;

    /// Read from the cursor
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write at the cursor
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

impl<D: FlashDevice + ?Sized> FlashDevice for &mut D {
    fn info(&mut self) -> io::Result<FlashInfo> {
        (**self).info()
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        (**self).unlock(start, len)
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        (**self).erase(start, len)
    }

    fn rewind(&mut self) -> io::Result<()> {
        (**self).rewind()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }
}

/// Query and sanity-check the device geometry
pub fn query_info<D: FlashDevice + ?Sized>(device: &mut D) -> Result<FlashInfo> {
    let info = device.info().map_err(Error::DeviceInfo)?;

    check_erase_size(&info)?;

    debug!(
        "Device: size={} bytes, erase_size={} bytes, flags={:?}",
        info.total_size, info.erase_block_size, info.flags
    );
    Ok(info)
}

fn check_erase_size(info: &FlashInfo) -> Result<()> {
    if info.erase_block_size == 0 {
        return Err(Error::DeviceInfo(io::Error::new(
            io::ErrorKind::InvalidData,
            "device reports a zero erase block size",
        )));
    }
    Ok(())
}

/// Number of erase blocks needed to cover `[start, start + len)`
pub fn blocks_covering(info: &FlashInfo, start: u64, len: u64) -> Result<u64> {
    check_erase_size(info)?;
    if len == 0 {
        return Ok(0);
    }
    let eb = info.erase_block_size;
    let first = start - start % eb;
    Ok((start + len - first).div_ceil(eb))
}

/// Erase every block touching `[start, start + len)`
///
/// Each block is unlocked, then erased. The first failure stops the loop;
/// blocks already erased stay erased. Returns the number of blocks erased.
pub fn erase_range<D, P>(
    device: &mut D,
    info: &FlashInfo,
    start: u64,
    len: u64,
    progress: &mut P,
) -> Result<u64>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    if !info.requires_erase() {
        debug!("Device doesn't require erase, skipping");
        return Ok(0);
    }

    let blocks = blocks_covering(info, start, len)?;
    let eb = info.erase_block_size;
    let first = start - start % eb;

    progress.erasing(blocks, blocks * eb);

    for block in 0..blocks {
        let offset = first + block * eb;
        trace!("Erasing block at {:#x}", offset);

        device.unlock(offset, eb).map_err(|source| Error::Erase {
            offset,
            step: EraseStep::Unlock,
            source,
        })?;
        device.erase(offset, eb).map_err(|source| Error::Erase {
            offset,
            step: EraseStep::Erase,
            source,
        })?;

        progress.erase_progress(block + 1);
    }

    Ok(blocks)
}

/// Sequential access to a device with position tracking for diagnostics
pub struct DeviceCursor<'a, D: FlashDevice + ?Sized> {
    device: &'a mut D,
    pos: u64,
}

impl<'a, D: FlashDevice + ?Sized> DeviceCursor<'a, D> {
    /// Rewind the device and start tracking from offset 0
    pub fn rewind(device: &'a mut D) -> Result<Self> {
        device.rewind().map_err(|source| Error::DeviceIo {
            op: IoOp::Seek,
            offset: 0,
            source,
        })?;
        Ok(Self { device, pos: 0 })
    }

    /// Current offset from the start of the partition
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Fill `buf` with a single device read
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.pos;
        let n = self.device.read(buf).map_err(|source| Error::DeviceIo {
            op: IoOp::Read,
            offset,
            source,
        })?;
        if n != buf.len() {
            return Err(Error::ShortTransfer {
                op: IoOp::Read,
                offset,
                expected: buf.len(),
                actual: n,
            });
        }
        self.pos += n as u64;
        Ok(())
    }

    /// Write all of `data` with a single device write
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        let offset = self.pos;
        let n = self.device.write(data).map_err(|source| Error::DeviceIo {
            op: IoOp::Write,
            offset,
            source,
        })?;
        if n != data.len() {
            return Err(Error::ShortTransfer {
                op: IoOp::Write,
                offset,
                expected: data.len(),
                actual: n,
            });
        }
        self.pos += n as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    /// Records calls and fails on request
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(&'static str, u64, u64)>,
        fail_unlock_at: Option<u64>,
        fail_erase_at: Option<u64>,
        short_by: usize,
    }

    impl FlashDevice for Recorder {
        fn info(&mut self) -> io::Result<FlashInfo> {
            Ok(FlashInfo::new(0x10000, 0x1000))
        }

        fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
            if self.fail_unlock_at == Some(start) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.calls.push(("unlock", start, len));
            Ok(())
        }

        fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
            if self.fail_erase_at == Some(start) {
                return Err(io::Error::other("erase failed"));
            }
            self.calls.push(("erase", start, len));
            Ok(())
        }

        fn rewind(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            Ok(buf.len() - self.short_by)
        }

        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            Ok(data.len() - self.short_by)
        }
    }

    fn erased_blocks(dev: &Recorder) -> Vec<u64> {
        dev.calls
            .iter()
            .filter(|(op, _, _)| *op == "erase")
            .map(|(_, start, _)| *start)
            .collect()
    }

    #[test]
    fn test_blocks_covering() {
        let info = FlashInfo::new(0x10000, 0x1000);
        assert_eq!(blocks_covering(&info, 0, 0).unwrap(), 0);
        assert_eq!(blocks_covering(&info, 0, 1).unwrap(), 1);
        assert_eq!(blocks_covering(&info, 0, 0x1000).unwrap(), 1);
        assert_eq!(blocks_covering(&info, 0, 0x1001).unwrap(), 2);
        assert_eq!(blocks_covering(&info, 0xFFF, 2).unwrap(), 2);
    }

    #[test]
    fn test_zero_erase_size_is_rejected_without_device_calls() {
        let info = FlashInfo::new(0x10000, 0);
        assert!(matches!(
            blocks_covering(&info, 0x800, 0x100),
            Err(Error::DeviceInfo(_))
        ));

        let mut dev = Recorder::default();
        let err = erase_range(&mut dev, &info, 0x800, 0x100, &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::DeviceInfo(_)));
        assert!(dev.calls.is_empty());
    }

    #[test]
    fn test_erase_range_unlocks_then_erases_each_block() {
        let mut dev = Recorder::default();
        let info = FlashInfo::new(0x10000, 0x1000);
        let blocks = erase_range(&mut dev, &info, 0, 0x2800, &mut NoProgress).unwrap();

        assert_eq!(blocks, 3);
        assert_eq!(
            dev.calls,
            vec![
                ("unlock", 0, 0x1000),
                ("erase", 0, 0x1000),
                ("unlock", 0x1000, 0x1000),
                ("erase", 0x1000, 0x1000),
                ("unlock", 0x2000, 0x1000),
                ("erase", 0x2000, 0x1000),
            ]
        );
    }

    #[test]
    fn test_erase_range_stops_at_first_failure() {
        let mut dev = Recorder {
            fail_erase_at: Some(0x2000),
            ..Default::default()
        };
        let info = FlashInfo::new(0x10000, 0x1000);
        let err = erase_range(&mut dev, &info, 0, 0x8000, &mut NoProgress).unwrap_err();

        assert!(matches!(
            err,
            Error::Erase { offset: 0x2000, step: EraseStep::Erase, .. }
        ));
        assert_eq!(erased_blocks(&dev), vec![0, 0x1000]);
    }

    #[test]
    fn test_erase_range_unlock_failure() {
        let mut dev = Recorder {
            fail_unlock_at: Some(0x1000),
            ..Default::default()
        };
        let info = FlashInfo::new(0x10000, 0x1000);
        let err = erase_range(&mut dev, &info, 0, 0x4000, &mut NoProgress).unwrap_err();

        assert!(matches!(
            err,
            Error::Erase { offset: 0x1000, step: EraseStep::Unlock, .. }
        ));
        assert_eq!(erased_blocks(&dev), vec![0]);
    }

    #[test]
    fn test_erase_range_skipped_without_erase_requirement() {
        let mut dev = Recorder::default();
        let mut info = FlashInfo::new(0x10000, 0x1000);
        info.flags |= MtdFlags::NO_ERASE;
        assert_eq!(erase_range(&mut dev, &info, 0, 0x4000, &mut NoProgress).unwrap(), 0);
        assert!(dev.calls.is_empty());
    }

    #[test]
    fn test_cursor_short_write_is_fatal() {
        let mut dev = Recorder {
            short_by: 1,
            ..Default::default()
        };
        let mut cursor = DeviceCursor::rewind(&mut dev).unwrap();
        let err = cursor.write_chunk(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortTransfer { op: IoOp::Write, offset: 0, expected: 16, actual: 15 }
        ));
    }

    #[test]
    fn test_cursor_tracks_position() {
        let mut dev = Recorder::default();
        let mut cursor = DeviceCursor::rewind(&mut dev).unwrap();
        let mut buf = [0u8; 8];
        cursor.read_chunk(&mut buf).unwrap();
        cursor.read_chunk(&mut buf[..3]).unwrap();
        assert_eq!(cursor.position(), 11);
    }

    #[test]
    fn test_query_info_rejects_zero_erase_size() {
        struct NoGeometry;
        impl FlashDevice for NoGeometry {
            fn info(&mut self) -> io::Result<FlashInfo> {
                Ok(FlashInfo::new(0x1000, 0))
            }
            fn unlock(&mut self, _: u64, _: u64) -> io::Result<()> {
                Ok(())
            }
            fn erase(&mut self, _: u64, _: u64) -> io::Result<()> {
                Ok(())
            }
            fn rewind(&mut self) -> io::Result<()> {
                Ok(())
            }
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
        }

        assert!(matches!(query_info(&mut NoGeometry), Err(Error::DeviceInfo(_))));
    }
}
