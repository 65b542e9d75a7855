use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use specsynth_core::modules::grid_scan::ScanProgress;

const SCAN_PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} cells {msg}";

/// Terminal progress bar fed by the grid scanner's workers.
pub(super) struct ScanProgressBar {
    bar: ProgressBar,
}

impl ScanProgressBar {
    pub(super) fn new() -> anyhow::Result<Self> {
        let style = ProgressStyle::default_bar()
            .template(SCAN_PROGRESS_TEMPLATE)
            .context("invalid scan progress template")?
            .progress_chars("=>-");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        Ok(Self { bar })
    }

    /// A bar that never draws, for `--quiet` runs.
    pub(super) fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub(super) fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ScanProgress for ScanProgressBar {
    fn scan_started(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn point_completed(&self) {
        self.bar.inc(1);
    }
}
