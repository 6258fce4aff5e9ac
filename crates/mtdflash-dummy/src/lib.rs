//! mtdflash-dummy - In-memory MTD partition emulator for testing
//!
//! This crate provides a dummy partition that emulates an MTD character
//! device in memory. It's useful for testing the transfer pipeline without
//! real hardware: every capability call is recorded, and erase, unlock,
//! info and short-I/O failures can be injected at chosen offsets.
//!
//! The emulation follows NOR semantics: erase sets bytes to 0xFF and
//! programming can only clear bits, so data written over an unerased
//! region comes back corrupted.

use log::trace;
use mtdflash_core::{FlashDevice, FlashInfo, MtdFlags};
use std::io;

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

/// Configuration for the dummy partition
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Partition size in bytes
    pub size: usize,
    /// Erase block size in bytes
    pub erase_size: usize,
    /// Flags reported by `info()`
    pub flags: MtdFlags,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 1024 * 1024,
            erase_size: 64 * 1024,
            flags: MtdFlags::WRITEABLE,
        }
    }
}

/// A recorded capability call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyOp {
    /// `info()`
    Info,
    /// `unlock(start, len)`
    Unlock(u64, u64),
    /// `erase(start, len)`
    Erase(u64, u64),
    /// `rewind()`
    Rewind,
    /// `read` of `len` bytes at `offset`
    Read(u64, usize),
    /// `write` of `len` bytes at `offset`
    Write(u64, usize),
}

/// Failures to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `info()` fails
    pub info: bool,
    /// `unlock()` fails for the block at this offset
    pub unlock_at: Option<u64>,
    /// `erase()` fails for the block at this offset
    pub erase_at: Option<u64>,
    /// A write covering this offset stops just before it
    pub short_write_at: Option<u64>,
    /// A read covering this offset stops just before it
    pub short_read_at: Option<u64>,
}

/// Dummy MTD partition
///
/// Emulates a partition device in memory for testing purposes.
pub struct DummyMtd {
    config: DummyConfig,
    data: Vec<u8>,
    pos: u64,
    ops: Vec<DummyOp>,
    faults: Faults,
}

impl DummyMtd {
    /// Create a new, fully erased dummy partition
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![ERASED; config.size];
        Self {
            config,
            data,
            pos: 0,
            ops: Vec::new(),
            faults: Faults::default(),
        }
    }

    /// Create a dummy partition of `size` bytes with `erase_size` blocks
    pub fn with_geometry(size: usize, erase_size: usize) -> Self {
        Self::new(DummyConfig {
            size,
            erase_size,
            ..DummyConfig::default()
        })
    }

    /// Create a dummy partition with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut mtd = Self::new(config);
        let len = initial_data.len().min(mtd.data.len());
        mtd.data[..len].copy_from_slice(&initial_data[..len]);
        mtd
    }

    /// Inject failures
    pub fn set_faults(&mut self, faults: Faults) {
        self.faults = faults;
    }

    /// Get a reference to the partition contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the partition contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Every call made so far, in order
    pub fn ops(&self) -> &[DummyOp] {
        &self.ops
    }

    /// Forget recorded calls
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Start offsets of all successful erases
    pub fn erased_blocks(&self) -> Vec<u64> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DummyOp::Erase(start, _) => Some(*start),
                _ => None,
            })
            .collect()
    }

    /// Whether any erase or write call reached the device
    pub fn was_modified(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, DummyOp::Erase(..) | DummyOp::Write(..)))
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Bytes the next transfer of `len` may move before a short-I/O fault
    fn allowed(&self, len: usize, fault_at: Option<u64>) -> usize {
        let end = self.data.len() as u64;
        let mut allowed = end.saturating_sub(self.pos).min(len as u64);
        if let Some(at) = fault_at {
            if at >= self.pos && at < self.pos + allowed {
                allowed = at - self.pos;
            }
        }
        allowed as usize
    }

    fn check_block(&self, start: u64, len: u64) -> io::Result<()> {
        let eb = self.config.erase_size as u64;
        if start % eb != 0 || len != eb {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unaligned erase {:#x}+{:#x}", start, len),
            ));
        }
        if start + len > self.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("erase {:#x}+{:#x} beyond end", start, len),
            ));
        }
        Ok(())
    }
}

impl FlashDevice for DummyMtd {
    fn info(&mut self) -> io::Result<FlashInfo> {
        if self.faults.info {
            return Err(io::Error::from_raw_os_error(25)); // ENOTTY
        }
        self.ops.push(DummyOp::Info);
        Ok(FlashInfo {
            total_size: self.config.size as u64,
            erase_block_size: self.config.erase_size as u64,
            flags: self.config.flags,
        })
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        if self.faults.unlock_at == Some(start) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.check_block(start, len)?;
        self.ops.push(DummyOp::Unlock(start, len));
        Ok(())
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        if self.faults.erase_at == Some(start) {
            return Err(io::Error::other("erase failed"));
        }
        self.check_block(start, len)?;
        trace!("Dummy erase {:#x}+{:#x}", start, len);
        // Erase sets all bytes to 0xFF
        self.data[start as usize..(start + len) as usize].fill(ERASED);
        self.ops.push(DummyOp::Erase(start, len));
        Ok(())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        self.ops.push(DummyOp::Rewind);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.allowed(buf.len(), self.faults.short_read_at);
        let start = self.pos as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.ops.push(DummyOp::Read(self.pos, n));
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.config.flags.contains(MtdFlags::WRITEABLE) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        let n = self.allowed(data.len(), self.faults.short_write_at);
        let start = self.pos as usize;
        // Flash programming: can only change 1 -> 0
        for (dst, src) in self.data[start..start + n].iter_mut().zip(&data[..n]) {
            *dst &= *src;
        }
        self.ops.push(DummyOp::Write(self.pos, n));
        self.pos += n as u64;
        Ok(n)
    }
}
