//! Linux MTD device implementation

use crate::error::{LinuxMtdError, Result};
use log::{debug, info, trace};
use mtdflash_core::{FlashDevice, FlashInfo, MtdFlags, OpenMode};
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// MEMGETINFO ioctl argument structure
/// Matches struct mtd_info_user from mtd/mtd-abi.h
#[repr(C)]
#[derive(Debug, Default)]
struct MtdInfoUser {
    mtd_type: u8,
    flags: u32,
    size: u32,
    erasesize: u32,
    writesize: u32,
    oobsize: u32,
    padding: u64,
}

/// MEMERASE / MEMUNLOCK ioctl argument structure
/// Matches struct erase_info_user from mtd/mtd-abi.h
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
struct EraseInfo {
    start: u32,
    length: u32,
}

// MEMGETINFO = _IOR('M', 1, struct mtd_info_user)
nix::ioctl_read!(memgetinfo, b'M', 1, MtdInfoUser);
// MEMERASE = _IOW('M', 2, struct erase_info_user)
nix::ioctl_write_ptr!(memerase, b'M', 2, EraseInfo);
// MEMUNLOCK = _IOW('M', 6, struct erase_info_user)
nix::ioctl_write_ptr!(memunlock, b'M', 6, EraseInfo);

fn mtd_type_name(mtd_type: u8) -> &'static str {
    match mtd_type {
        0 => "absent",
        1 => "ram",
        2 => "rom",
        3 => "nor",
        4 => "nand",
        6 => "dataflash",
        7 => "ubi",
        8 => "mlc-nand",
        _ => "unknown",
    }
}

fn erase_info(start: u64, len: u64) -> Result<EraseInfo> {
    Ok(EraseInfo {
        start: u32::try_from(start).map_err(|_| LinuxMtdError::OutOfRange(start))?,
        length: u32::try_from(len).map_err(|_| LinuxMtdError::OutOfRange(len))?,
    })
}

/// Linux MTD device handle
///
/// Wraps an open `/dev/mtdN` character device. The descriptor is owned by
/// the `File` and closed when the handle is dropped, whatever the outcome
/// of the operation using it.
///
/// # Example
///
/// ```ignore
/// use mtdflash_linux_mtd::LinuxMtd;
/// use mtdflash_core::{image, NoProgress, OpenMode, TransferConfig};
///
/// let mut mtd = LinuxMtd::open("/dev/mtd1", OpenMode::ReadOnly)?;
/// image::verify(&mut mtd, "kernel.bin".as_ref(), &TransferConfig::default(), &mut NoProgress)?;
/// ```
#[derive(Debug)]
pub struct LinuxMtd {
    file: File,
    path: PathBuf,
}

impl LinuxMtd {
    /// Open an MTD character device
    ///
    /// # Errors
    /// Returns [`LinuxMtdError::Open`] if the node doesn't exist or can't be
    /// opened in the requested mode.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(&path)
            .map_err(|source| LinuxMtdError::Open {
                path: path.clone(),
                source,
            })?;

        debug!("Opened {} ({:?}, fd {})", path.display(), mode, file.as_raw_fd());
        Ok(Self { file, path })
    }

    /// Device node this handle was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_info(&self) -> Result<MtdInfoUser> {
        let mut raw = MtdInfoUser::default();
        // SAFETY: valid descriptor and a properly sized, writable mtd_info_user
        unsafe { memgetinfo(self.file.as_raw_fd(), &mut raw) }.map_err(|source| {
            LinuxMtdError::Ioctl {
                request: "MEMGETINFO",
                source,
            }
        })?;
        Ok(raw)
    }
}

impl FlashDevice for LinuxMtd {
    fn info(&mut self) -> io::Result<FlashInfo> {
        let raw = self.get_info()?;

        info!(
            "{}: type={}, size={} bytes, erase_size={} bytes, write_size={}",
            self.path.display(),
            mtd_type_name(raw.mtd_type),
            raw.size,
            raw.erasesize,
            raw.writesize
        );

        Ok(FlashInfo {
            total_size: u64::from(raw.size),
            erase_block_size: u64::from(raw.erasesize),
            flags: MtdFlags::from_bits_truncate(raw.flags),
        })
    }

    fn unlock(&mut self, start: u64, len: u64) -> io::Result<()> {
        let ei = erase_info(start, len)?;
        // SAFETY: valid descriptor and an initialized erase_info_user
        match unsafe { memunlock(self.file.as_raw_fd(), &ei) } {
            Ok(_) => Ok(()),
            // Chips without lock support have nothing to unlock
            Err(Errno::EOPNOTSUPP) => {
                trace!("MEMUNLOCK not supported at {:#x}", start);
                Ok(())
            }
            Err(source) => Err(LinuxMtdError::Ioctl {
                request: "MEMUNLOCK",
                source,
            }
            .into()),
        }
    }

    fn erase(&mut self, start: u64, len: u64) -> io::Result<()> {
        let ei = erase_info(start, len)?;
        // SAFETY: valid descriptor and an initialized erase_info_user
        unsafe { memerase(self.file.as_raw_fd(), &ei) }.map_err(|source| LinuxMtdError::Ioctl {
            request: "MEMERASE",
            source,
        })?;
        Ok(())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_erase_info_range() {
        assert_eq!(
            erase_info(0x10000, 0x1000).unwrap(),
            EraseInfo {
                start: 0x10000,
                length: 0x1000
            }
        );
        assert!(matches!(
            erase_info(1 << 32, 0x1000),
            Err(LinuxMtdError::OutOfRange(0x1_0000_0000))
        ));
    }

    #[test]
    fn test_mtd_info_user_layout() {
        // 1 + 3 padding + 5 * 4 + 8
        assert_eq!(std::mem::size_of::<MtdInfoUser>(), 32);
        assert_eq!(std::mem::size_of::<EraseInfo>(), 8);
    }

    #[test]
    fn test_open_missing_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mtd9");
        let err = LinuxMtd::open(&path, OpenMode::ReadOnly).unwrap_err();
        assert!(matches!(&err, LinuxMtdError::Open { path: p, .. } if *p == path));

        let core: mtdflash_core::Error = err.into();
        assert!(matches!(core, mtdflash_core::Error::DeviceOpen { .. }));
    }

    #[test]
    fn test_sequential_io_on_regular_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();

        let mut mtd = LinuxMtd::open(tmp.path(), OpenMode::ReadWrite).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(mtd.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");

        mtd.rewind().unwrap();
        assert_eq!(mtd.write(b"ab").unwrap(), 2);
        mtd.rewind().unwrap();
        assert_eq!(mtd.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ab23");
    }

    #[test]
    fn test_info_fails_on_regular_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut mtd = LinuxMtd::open(tmp.path(), OpenMode::ReadOnly).unwrap();
        assert!(mtd.info().is_err());
    }
}
