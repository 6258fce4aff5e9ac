//! Image and framed-file command implementations
//!
//! Each command resolves a partition name, opens its device node and runs
//! one core pipeline against it.

use super::progress::IndicatifProgress;
use mtdflash_core::{
    framed, image, OpenMode, PartitionTable, Result, TransferConfig, TransferProgress,
    TransferStats,
};
use mtdflash_linux_mtd::{open_mtd, LinuxMtd};
use std::path::Path;

/// Which pipeline to run on the opened partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    WriteImage,
    CheckImage,
    WriteFile,
    ReadFile,
    CheckFile,
}

impl Action {
    fn mode(self) -> OpenMode {
        match self {
            Action::WriteImage | Action::WriteFile => OpenMode::ReadWrite,
            Action::CheckImage | Action::ReadFile | Action::CheckFile => OpenMode::ReadOnly,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Action::WriteImage => "Write image",
            Action::CheckImage => "Check image",
            Action::WriteFile => "Write file",
            Action::ReadFile => "Read file",
            Action::CheckFile => "Check file",
        }
    }

    fn run(
        self,
        device: &mut LinuxMtd,
        path: &Path,
        config: &TransferConfig,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferStats> {
        match self {
            Action::WriteImage => image::write(device, path, config, progress),
            Action::CheckImage => image::verify(device, path, config, progress),
            Action::WriteFile => framed::write(device, path, config, progress),
            Action::ReadFile => framed::read(device, path, config, progress),
            Action::CheckFile => framed::verify(device, path, config, progress),
        }
    }
}

/// Run `action` between partition `name` and the file at `path`
pub fn run_action(
    table: &PartitionTable,
    action: Action,
    name: &str,
    path: &Path,
    show_progress: bool,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let device_path = table.resolve(name)?;
    log::debug!("Partition '{}' is {}", name, device_path.display());

    let mut progress = IndicatifProgress::new(show_progress);
    let result = open_mtd(device_path, action.mode()).and_then(|mut device| {
        action.run(&mut device, path, &TransferConfig::default(), &mut progress)
    });

    match result {
        Ok(stats) => {
            println!(
                "{} {} on {} ({} bytes): Ok!",
                action.verb(),
                path.display(),
                name,
                stats.bytes
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            Err(format!(
                "{} {} on {} ({}) failed: {}",
                action.verb(),
                path.display(),
                name,
                device_path.display(),
                e
            )
            .into())
        }
    }
}
