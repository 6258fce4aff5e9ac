//! Terminal progress for transfers, drawn with indicatif

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use mtdflash_core::{Phase, TransferProgress, TransferStats};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    match ProgressStyle::with_template(template) {
        Ok(style) => style.progress_chars("#>-"),
        Err(e) => {
            log::debug!("Bad progress template: {}", e);
            fallback
        }
    }
}

/// One bar (or spinner) at a time, replaced as the pipeline changes stage
pub struct IndicatifProgress {
    visible: bool,
    active: Option<ProgressBar>,
    phase: Option<Phase>,
}

impl IndicatifProgress {
    /// A hidden reporter keeps its state but draws nothing
    pub fn new(visible: bool) -> Self {
        Self {
            visible,
            active: None,
            phase: None,
        }
    }

    fn start(&mut self, bar: ProgressBar) -> &ProgressBar {
        if !self.visible {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        self.close("done");
        self.active.insert(bar)
    }

    fn close(&mut self, message: &'static str) {
        if let Some(bar) = self.active.take() {
            bar.finish_with_message(message);
        }
    }

    /// Stop the active bar in place and mark it failed
    pub fn abandon(&mut self) {
        if let Some(bar) = self.active.take() {
            bar.abandon_with_message("Fail!");
        }
    }
}

impl TransferProgress for IndicatifProgress {
    fn erasing(&mut self, blocks_to_erase: u64, bytes_to_erase: u64) {
        let spinner = ProgressBar::new_spinner()
            .with_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner()))
            .with_message(format!("Erasing {} bytes in {} blocks", bytes_to_erase, blocks_to_erase));
        self.start(spinner)
            .enable_steady_tick(Duration::from_millis(100));
    }

    fn erase_progress(&mut self, blocks_erased: u64) {
        if let Some(spinner) = &self.active {
            spinner.set_message(format!("{} blocks erased", blocks_erased));
        }
    }

    fn transferring(&mut self, phase: Phase, total_bytes: u64) {
        let bar = ProgressBar::new(total_bytes)
            .with_style(style(BAR_TEMPLATE, ProgressStyle::default_bar()))
            .with_message(phase.to_string());
        self.phase = Some(phase);
        self.start(bar);
    }

    fn transfer_progress(&mut self, bytes_done: u64) {
        if let Some(bar) = &self.active {
            bar.set_position(bytes_done);
        }
    }

    fn complete(&mut self, stats: &TransferStats) {
        if let Some(bar) = self.active.take() {
            let label = self
                .phase
                .take()
                .map_or_else(|| "Transfer".to_string(), |phase| phase.to_string());
            bar.finish_with_message(format!("{} done, {} bytes", label, stats.bytes));
        }
    }
}
