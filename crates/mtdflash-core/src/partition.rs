//! Partition discovery from the kernel MTD table
//!
//! `/proc/mtd` looks like this:
//!
//! ```text
//! dev:    size   erasesize  name
//! mtd0: 00040000 00010000 "bootloader"
//! mtd1: 00400000 00010000 "kernel"
//! ```
//!
//! Each matching line becomes a [`PartitionRecord`]. Lines that don't match
//! (the header, names with characters outside `[A-Za-z0-9_]`) are skipped.

use crate::error::{Error, Result};
use log::{debug, warn};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default location of the kernel partition table
pub const PROC_MTD: &str = "/proc/mtd";

/// Default maximum number of partitions kept by discovery
pub const DEFAULT_MAX_PARTITIONS: usize = 16;

const MTD_LINE: &str =
    r#"(?m)^mtd([0-9]+):[ \t]+([0-9A-Fa-f]+)[ \t]+([0-9A-Fa-f]+)[ \t]+"([A-Za-z0-9_]+)"[ \t]*\r?$"#;

/// One discovered partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    /// Numeric suffix of `mtdN`
    pub id: u32,
    /// Partition name, the lookup key
    pub name: String,
    /// Character device, `/dev/mtdN`
    pub device_path: PathBuf,
    /// Partition size from the table, in bytes
    pub size: u64,
    /// Erase block size from the table, in bytes
    pub erase_size: u64,
}

impl fmt::Display for PartitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}     Path: {}     Name: {}",
            self.id,
            self.device_path.display(),
            self.name
        )
    }
}

/// Ordered set of partitions produced by one discovery call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTable {
    records: Vec<PartitionRecord>,
}

impl PartitionTable {
    /// Parse a partition table using the default capacity
    pub fn discover(text: &str) -> Self {
        Self::discover_with_capacity(text, DEFAULT_MAX_PARTITIONS)
    }

    /// Parse a partition table, keeping at most `capacity` records
    pub fn discover_with_capacity(text: &str, capacity: usize) -> Self {
        let re = match Regex::new(MTD_LINE) {
            Ok(re) => re,
            Err(e) => {
                warn!("Partition pattern rejected: {}", e);
                return Self::default();
            }
        };

        let mut records = Vec::new();
        for caps in re.captures_iter(text) {
            if records.len() >= capacity {
                debug!("Partition capacity ({}) reached, ignoring the rest", capacity);
                break;
            }

            let Ok(id) = caps[1].parse::<u32>() else {
                // Absurdly long id; treat as the end of the usable table
                break;
            };
            let size = u64::from_str_radix(&caps[2], 16).unwrap_or(0);
            let erase_size = u64::from_str_radix(&caps[3], 16).unwrap_or(0);

            records.push(PartitionRecord {
                id,
                name: caps[4].to_string(),
                device_path: PathBuf::from(format!("/dev/mtd{}", id)),
                size,
                erase_size,
            });
        }

        debug!("Discovered {} partition(s)", records.len());
        Self { records }
    }

    /// Read and parse a partition table file
    ///
    /// An unreadable file yields an empty table: having no partitions is a
    /// valid state, not an error.
    pub fn load(path: &Path, capacity: usize) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::discover_with_capacity(&text, capacity),
            Err(e) => {
                warn!("Can't read partition table {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Look up a partition by exact, case-sensitive name
    pub fn get(&self, name: &str) -> Option<&PartitionRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Resolve a partition name to its device path
    pub fn resolve(&self, name: &str) -> Result<&Path> {
        self.get(name)
            .map(|r| r.device_path.as_path())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Iterate over the records in table order
    pub fn iter(&self) -> std::slice::Iter<'_, PartitionRecord> {
        self.records.iter()
    }

    /// Number of discovered partitions
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no partitions were discovered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a PartitionTable {
    type Item = &'a PartitionRecord;
    type IntoIter = std::slice::Iter<'a, PartitionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = "dev:    size   erasesize  name\n\
                           mtd0: 00040000 00010000 \"bootloader\"\n\
                           mtd1: 00400000 00010000 \"kernel\"\n";

    #[test]
    fn test_discover_fixture() {
        let table = PartitionTable::discover(FIXTURE);
        assert_eq!(table.len(), 2);

        let records: Vec<_> = table.iter().collect();
        assert_eq!(records[0].id, 0);
        assert_eq!(records[0].name, "bootloader");
        assert_eq!(records[0].device_path, PathBuf::from("/dev/mtd0"));
        assert_eq!(records[0].size, 0x40000);
        assert_eq!(records[0].erase_size, 0x10000);

        assert_eq!(records[1].id, 1);
        assert_eq!(records[1].name, "kernel");
        assert_eq!(records[1].device_path, PathBuf::from("/dev/mtd1"));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let table = PartitionTable::discover(FIXTURE);
        assert_eq!(table.resolve("kernel").unwrap(), Path::new("/dev/mtd1"));
        assert!(matches!(
            table.resolve("KERNEL"),
            Err(Error::NotFound(name)) if name == "KERNEL"
        ));
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let text = "mtd3: 1000 1000 \"data\"\nmtd7: 1000 1000 \"data\"\n";
        let table = PartitionTable::discover(text);
        assert_eq!(table.resolve("data").unwrap(), Path::new("/dev/mtd3"));
    }

    #[test]
    fn test_empty_text() {
        assert!(PartitionTable::discover("").is_empty());
        assert!(PartitionTable::discover("dev:    size   erasesize  name\n").is_empty());
    }

    #[test]
    fn test_non_matching_lines_are_skipped() {
        let text = "dev:    size   erasesize  name\n\
                    mtd0: 00040000 00010000 \"u-boot\"\n\
                    mtd1: 00010000 00010000 \"env\"\n\
                    garbage\n\
                    mtd2: 00F00000 00010000 \"rootfs_a\"\n";
        let table = PartitionTable::discover(text);
        let names: Vec<_> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["env", "rootfs_a"]);
        assert_eq!(table.get("rootfs_a").unwrap().size, 0xF00000);
    }

    #[test]
    fn test_capacity_bound() {
        let text: String = (0..20)
            .map(|i| format!("mtd{}: 00010000 00010000 \"part{}\"\n", i, i))
            .collect();
        assert_eq!(PartitionTable::discover(&text).len(), DEFAULT_MAX_PARTITIONS);

        let table = PartitionTable::discover_with_capacity(&text, 3);
        let ids: Vec<_> = table.iter().map(|r| r.id).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_display() {
        let table = PartitionTable::discover(FIXTURE);
        let lines: Vec<_> = table.iter().map(|r| r.to_string()).collect();
        assert_eq!(lines[1], "Id: 1     Path: /dev/mtd1     Name: kernel");
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let table = PartitionTable::load(file.path(), DEFAULT_MAX_PARTITIONS);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = PartitionTable::load(&dir.path().join("mtd"), DEFAULT_MAX_PARTITIONS);
        assert!(table.is_empty());
    }
}
