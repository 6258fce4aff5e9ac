//! mtdflash - write, read and check data on Linux MTD flash partitions
//!
//! Partitions are discovered from `/proc/mtd` and addressed by name. Two
//! transfer layouts are supported:
//! - **Raw images** are written from offset 0 of the partition and checked
//!   byte for byte against the source file
//! - **Framed files** are stored behind an 8-byte header that records the
//!   payload length, so they can be read back without knowing their size

mod cli;
mod commands;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cli::{Cli, Operation};
use commands::Action;
use mtdflash_core::{PartitionTable, DEFAULT_MAX_PARTITIONS};
use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    ExitCode::from(run(std::env::args_os()))
}

/// Terminal output is best effort; a closed stdout must not change the exit status
fn report(result: io::Result<()>) {
    if let Err(e) = result {
        log::debug!("Failed to write to the terminal: {}", e);
    }
}

/// Parse `args`, run the selected operation and return the exit status
fn run<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                report(e.print());
                return EXIT_OK;
            }
            _ => {
                report(e.print());
                report(Cli::command().print_help());
                return EXIT_FAILURE;
            }
        },
    };

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let table = PartitionTable::load(&cli.mtd_table, DEFAULT_MAX_PARTITIONS);
    log::debug!(
        "Discovered {} partitions from {}",
        table.len(),
        cli.mtd_table.display()
    );

    let show_progress = !cli.no_progress;
    let result = match cli.operation() {
        None => {
            report(Cli::command().print_help());
            println!("\nAvailable partitions:");
            commands::list_partitions(&table, cli.verbose > 0);
            Ok(())
        }
        Some(Operation::List) => {
            commands::list_partitions(&table, cli.verbose > 0);
            Ok(())
        }
        Some(Operation::WriteImage { name, path }) => {
            commands::run_action(&table, Action::WriteImage, &name, &path, show_progress)
        }
        Some(Operation::CheckImage { name, path }) => {
            commands::run_action(&table, Action::CheckImage, &name, &path, show_progress)
        }
        Some(Operation::WriteFile { name, path }) => {
            commands::run_action(&table, Action::WriteFile, &name, &path, show_progress)
        }
        Some(Operation::ReadFile { name, path }) => {
            commands::run_action(&table, Action::ReadFile, &name, &path, show_progress)
        }
        Some(Operation::CheckFile { name, path }) => {
            commands::run_action(&table, Action::CheckFile, &name, &path, show_progress)
        }
    };

    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "dev:    size   erasesize  name\n\
mtd0: 00040000 00010000 \"u_boot\"\n\
mtd1: 00400000 00010000 \"kernel\"\n\
mtd2: 00020000 00010000 \"cfg\"\n";

    fn table_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        file
    }

    fn run_with(table: &NamedTempFile, args: &[&str]) -> u8 {
        let mut argv = vec![
            OsString::from("mtdflash"),
            OsString::from("--no-progress"),
            OsString::from("--mtd-table"),
            table.path().as_os_str().to_owned(),
        ];
        argv.extend(args.iter().map(OsString::from));
        run(argv)
    }

    #[test]
    fn test_no_arguments_prints_usage_and_succeeds() {
        let table = table_file();
        assert_eq!(run_with(&table, &[]), EXIT_OK);
    }

    #[test]
    fn test_list_succeeds() {
        let table = table_file();
        assert_eq!(run_with(&table, &["--list"]), EXIT_OK);
        assert_eq!(run_with(&table, &["-v", "--list"]), EXIT_OK);
    }

    #[test]
    fn test_help_succeeds() {
        assert_eq!(run(["mtdflash", "--help"]), EXIT_OK);
    }

    #[test]
    fn test_wrong_argument_count_fails() {
        let table = table_file();
        assert_eq!(run_with(&table, &["--write_file", "cfg"]), EXIT_FAILURE);
    }

    #[test]
    fn test_unknown_command_fails() {
        let table = table_file();
        assert_eq!(run_with(&table, &["--erase_all", "cfg"]), EXIT_FAILURE);
    }

    #[test]
    fn test_unknown_partition_fails() {
        let table = table_file();
        let image = NamedTempFile::new().unwrap();
        let image_path = image.path().to_str().unwrap();
        assert_eq!(
            run_with(&table, &["--check_image", "rootfs", image_path]),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_missing_table_lists_nothing() {
        assert_eq!(
            run(["mtdflash", "--mtd-table", "/nonexistent/mtd", "--list"]),
            EXIT_OK
        );
    }
}
