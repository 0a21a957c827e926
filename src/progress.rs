//! Progress reporting during apply

use declarative::{ApplyResult, ProgressCallback, ResourceId};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// A bar with the standard style
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("  {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}

/// Drives a progress bar from convergence events
///
/// Failures are always printed above the bar. With `verbose`, every
/// completed resource is.
pub struct ApplyProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl ApplyProgress {
    pub fn new(total: usize, verbose: bool) -> Self {
        Self {
            bar: bar(total as u64, "Applying"),
            verbose,
        }
    }

    /// No terminal output, e.g. for `--json`
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self {
            bar,
            verbose: false,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&mut self, count: usize, parallel: bool) {
        log::debug!("Batch of {count} resources (parallel: {parallel})");
    }

    fn on_resource_start(&mut self, id: &ResourceId, _description: &str) {
        self.bar.set_message(id.to_string());
    }

    fn on_resource_complete(&mut self, id: &ResourceId, result: &ApplyResult) {
        self.bar
            .set_message(format!("{} {id}", ui::result_symbol(result)));
        self.bar.inc(1);

        if self.verbose || !result.is_success() {
            self.bar.println(ui::result_line(id, result));
        }
    }

    fn on_batch_complete(&mut self) {}

    fn on_refresh(&mut self, id: &ResourceId, result: &ApplyResult) {
        if self.verbose || !result.is_success() {
            self.bar
                .println(format!("{} (refresh)", ui::result_line(id, result)));
        }
    }
}
