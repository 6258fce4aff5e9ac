//! CLI argument parsing
//!
//! The option spelling (`--write_image`, `--check_file`, ...) is what
//! existing update scripts call, so it is kept verbatim.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Default partition table, kept in sync with `mtdflash_core::PROC_MTD`
const DEFAULT_MTD_TABLE: &str = "/proc/mtd";

#[derive(Parser)]
#[command(name = "mtdflash")]
#[command(author, version, about = "MTD partition image and file tool", long_about = None)]
#[command(group(
    ArgGroup::new("operation")
        .args(["list", "write_image", "check_image", "write_file", "read_file", "check_file"])
        .multiple(false)
))]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Partition table to discover partitions from
    #[arg(long, value_name = "PATH", default_value = DEFAULT_MTD_TABLE)]
    pub mtd_table: PathBuf,

    /// Don't draw progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// List mtd partitions
    #[arg(long)]
    pub list: bool,

    /// Write image to mtd partition
    #[arg(long = "write_image", num_args = 2, value_names = ["MTD_NAME", "IMAGE"])]
    pub write_image: Option<Vec<String>>,

    /// Check image in mtd partition
    #[arg(long = "check_image", num_args = 2, value_names = ["MTD_NAME", "IMAGE"])]
    pub check_image: Option<Vec<String>>,

    /// Write file to mtd partition
    #[arg(long = "write_file", num_args = 2, value_names = ["MTD_NAME", "FILE"])]
    pub write_file: Option<Vec<String>>,

    /// Read file from mtd partition
    #[arg(long = "read_file", num_args = 2, value_names = ["MTD_NAME", "FILE"])]
    pub read_file: Option<Vec<String>>,

    /// Check file in mtd partition
    #[arg(long = "check_file", num_args = 2, value_names = ["MTD_NAME", "FILE"])]
    pub check_file: Option<Vec<String>>,
}

/// The single operation selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    List,
    WriteImage { name: String, path: PathBuf },
    CheckImage { name: String, path: PathBuf },
    WriteFile { name: String, path: PathBuf },
    ReadFile { name: String, path: PathBuf },
    CheckFile { name: String, path: PathBuf },
}

/// Split a `NAME PATH` pair; clap enforces exactly two values
fn pair(values: &[String]) -> Option<(String, PathBuf)> {
    match values {
        [name, path] => Some((name.clone(), PathBuf::from(path))),
        _ => None,
    }
}

impl Cli {
    /// The requested operation, or `None` when only global options were given
    pub fn operation(&self) -> Option<Operation> {
        if self.list {
            return Some(Operation::List);
        }
        if let Some((name, path)) = self.write_image.as_deref().and_then(pair) {
            return Some(Operation::WriteImage { name, path });
        }
        if let Some((name, path)) = self.check_image.as_deref().and_then(pair) {
            return Some(Operation::CheckImage { name, path });
        }
        if let Some((name, path)) = self.write_file.as_deref().and_then(pair) {
            return Some(Operation::WriteFile { name, path });
        }
        if let Some((name, path)) = self.read_file.as_deref().and_then(pair) {
            return Some(Operation::ReadFile { name, path });
        }
        if let Some((name, path)) = self.check_file.as_deref().and_then(pair) {
            return Some(Operation::CheckFile { name, path });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("mtdflash").chain(args.iter().copied()))
    }

    #[test]
    fn test_no_operation() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.operation(), None);
        assert_eq!(cli.mtd_table, PathBuf::from("/proc/mtd"));
    }

    #[test]
    fn test_list() {
        assert_eq!(parse(&["--list"]).unwrap().operation(), Some(Operation::List));
    }

    #[test]
    fn test_name_path_pairs() {
        let cli = parse(&["--write_image", "kernel", "/tmp/uImage"]).unwrap();
        assert_eq!(
            cli.operation(),
            Some(Operation::WriteImage {
                name: "kernel".into(),
                path: PathBuf::from("/tmp/uImage"),
            })
        );

        let cli = parse(&["-v", "--mtd-table", "/tmp/mtd", "--check_file", "cfg", "a.bin"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.mtd_table, PathBuf::from("/tmp/mtd"));
        assert_eq!(
            cli.operation(),
            Some(Operation::CheckFile {
                name: "cfg".into(),
                path: PathBuf::from("a.bin"),
            })
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        assert!(parse(&["--write_file", "cfg"]).is_err());
        assert!(parse(&["--read_file", "cfg", "a", "b"]).is_err());
    }

    #[test]
    fn test_single_operation_only() {
        assert!(parse(&["--list", "--check_image", "kernel", "k.bin"]).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse(&["--flash_everything"]).is_err());
    }
}
