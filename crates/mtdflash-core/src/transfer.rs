//! Chunked copy and compare loops shared by image and framed transfers

use crate::device::{DeviceCursor, FlashDevice};
use crate::error::{Error, Result, SizeProblem};
use crate::progress::{Phase, TransferProgress};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Chunk size for writing files to flash
pub const WRITE_CHUNK_SIZE: usize = 128 * 1024;

/// Chunk size for reading and verifying
pub const READ_CHUNK_SIZE: usize = 1024;

/// Buffer sizes used by the transfer loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Bytes per device write
    pub write_chunk: usize,
    /// Bytes per device read (read back and verify)
    pub read_chunk: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            write_chunk: WRITE_CHUNK_SIZE,
            read_chunk: READ_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    fn write_len(&self) -> usize {
        self.write_chunk.max(1)
    }

    fn read_len(&self) -> usize {
        self.read_chunk.max(1)
    }
}

/// Open a local file and return it with its size
pub(crate) fn open_file(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file
        .metadata()
        .map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    Ok((file, size))
}

/// Reject empty files and files that don't fit next to `overhead` bytes
pub(crate) fn check_fits(size: u64, overhead: u64, capacity: u64) -> Result<()> {
    if size == 0 {
        return Err(Error::SizeInvalid(SizeProblem::Empty));
    }
    let required = size.saturating_add(overhead);
    if required > capacity {
        return Err(Error::SizeInvalid(SizeProblem::ExceedsCapacity { required, capacity }));
    }
    Ok(())
}

fn read_file(file: &mut File, path: &Path, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })
}

fn chunk_len(remaining: u64, chunk: usize) -> usize {
    remaining.min(chunk as u64) as usize
}

/// Stream `len` bytes of `file` to the device cursor
pub(crate) fn copy_to_device<D, P>(
    file: &mut File,
    path: &Path,
    cursor: &mut DeviceCursor<'_, D>,
    len: u64,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<u64>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let mut buf = vec![0u8; config.write_len()];
    let mut done = 0u64;

    progress.transferring(Phase::Writing, len);
    while done < len {
        let n = chunk_len(len - done, buf.len());
        read_file(file, path, &mut buf[..n])?;
        cursor.write_chunk(&buf[..n])?;
        done += n as u64;
        progress.transfer_progress(done);
    }

    Ok(done)
}

/// Stream `len` bytes from the device cursor into `file`
pub(crate) fn copy_from_device<D, P>(
    cursor: &mut DeviceCursor<'_, D>,
    file: &mut File,
    path: &Path,
    len: u64,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<u64>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let mut buf = vec![0u8; config.read_len()];
    let mut done = 0u64;

    progress.transferring(Phase::Reading, len);
    while done < len {
        let n = chunk_len(len - done, buf.len());
        cursor.read_chunk(&mut buf[..n])?;
        file.write_all(&buf[..n]).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })?;
        done += n as u64;
        progress.transfer_progress(done);
    }

    Ok(done)
}

/// Compare `len` bytes of `file` with the device, chunk by chunk
///
/// Mismatch offsets count from where the comparison started.
pub(crate) fn compare<D, P>(
    file: &mut File,
    path: &Path,
    cursor: &mut DeviceCursor<'_, D>,
    len: u64,
    config: &TransferConfig,
    progress: &mut P,
) -> Result<u64>
where
    D: FlashDevice + ?Sized,
    P: TransferProgress + ?Sized,
{
    let chunk = config.read_len();
    let mut expected = vec![0u8; chunk];
    let mut actual = vec![0u8; chunk];
    let mut done = 0u64;

    progress.transferring(Phase::Verifying, len);
    while done < len {
        let n = chunk_len(len - done, chunk);
        read_file(file, path, &mut expected[..n])?;
        cursor.read_chunk(&mut actual[..n])?;

        if let Some(i) = expected[..n]
            .iter()
            .zip(&actual[..n])
            .position(|(e, a)| e != a)
        {
            return Err(Error::VerifyMismatch {
                offset: done + i as u64,
                expected: expected[i],
                actual: actual[i],
            });
        }

        done += n as u64;
        progress.transfer_progress(done);
    }

    Ok(done)
}

/// Check the final byte count of a chunk loop
pub(crate) fn expect_total(transferred: u64, expected: u64) -> Result<()> {
    if transferred != expected {
        return Err(Error::TransferIncomplete {
            transferred,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_fits() {
        assert!(matches!(
            check_fits(0, 0, 100),
            Err(Error::SizeInvalid(SizeProblem::Empty))
        ));
        assert!(check_fits(100, 0, 100).is_ok());
        assert!(matches!(
            check_fits(101, 0, 100),
            Err(Error::SizeInvalid(SizeProblem::ExceedsCapacity { required: 101, capacity: 100 }))
        ));
        assert!(check_fits(92, 8, 100).is_ok());
        assert!(check_fits(93, 8, 100).is_err());
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(10, 4), 4);
        assert_eq!(chunk_len(3, 4), 3);
        assert_eq!(chunk_len(u64::MAX, WRITE_CHUNK_SIZE), WRITE_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_chunk_config_still_progresses() {
        let config = TransferConfig {
            write_chunk: 0,
            read_chunk: 0,
        };
        assert_eq!(config.write_len(), 1);
        assert_eq!(config.read_len(), 1);
    }

    #[test]
    fn test_expect_total() {
        assert!(expect_total(5, 5).is_ok());
        assert!(matches!(
            expect_total(4, 5),
            Err(Error::TransferIncomplete { transferred: 4, expected: 5 })
        ));
    }
}
