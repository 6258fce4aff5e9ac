//! mtdflash-core - Flash transfer pipeline for raw MTD partitions
//!
//! This crate provides partition discovery from the kernel MTD table and
//! the transfer operations run against a partition:
//!
//! - [`image`] - write/verify a whole-partition image with no framing
//! - [`framed`] - write/read/verify a file behind an 8-byte size header
//!
//! Every operation is a linear pipeline: query geometry, validate sizes,
//! erase (for writes), then stream in chunks. The first failure aborts the
//! operation; nothing is retried or rolled back, so a failed write can leave
//! a partition erased but empty.
//!
//! Devices are reached through the [`FlashDevice`] trait, implemented by
//! `mtdflash-linux-mtd` for `/dev/mtdN` and by `mtdflash-dummy` in memory.
//!
//! # Example
//!
//! ```ignore
//! use mtdflash_core::{framed, NoProgress, PartitionTable, TransferConfig, PROC_MTD};
//!
//! let table = PartitionTable::load(PROC_MTD.as_ref(), 16);
//! let path = table.resolve("config")?;
//! let mut mtd = LinuxMtd::open(path, OpenMode::ReadWrite)?;
//! framed::write(&mut mtd, "settings.bin".as_ref(), &TransferConfig::default(), &mut NoProgress)?;
//! ```

#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod framed;
pub mod image;
pub mod partition;
pub mod progress;
pub mod transfer;

pub use device::{
    blocks_covering, erase_range, query_info, DeviceCursor, FlashDevice, FlashInfo, MtdFlags,
    OpenMode,
};
pub use error::{EraseStep, Error, IoOp, Result, SizeProblem};
pub use framed::{TransferHeader, HEADER_LEN};
pub use partition::{PartitionRecord, PartitionTable, DEFAULT_MAX_PARTITIONS, PROC_MTD};
pub use progress::{NoProgress, Phase, TransferProgress, TransferStats};
pub use transfer::{TransferConfig, READ_CHUNK_SIZE, WRITE_CHUNK_SIZE};
