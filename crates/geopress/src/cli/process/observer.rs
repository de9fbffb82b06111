//! Terminal progress rendering for a run.

use geopress_core::{LogSeverity, RunObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// Renders run events as an indicatif progress bar on stderr.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                )
                .unwrap()
                .progress_chars("##-"),
        );
        bar.set_message("starting...");
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn on_progress(&self, processed: usize, _total: usize, current_item: &str) {
        self.bar.set_position(processed as u64);
        self.bar.set_message(current_item.to_string());
    }

    fn on_log(&self, severity: LogSeverity, message: &str) {
        // Errors surface above the bar; the rest stays in the bar message
        if severity == LogSeverity::Error {
            self.bar.println(format!("  ! {message}"));
        } else {
            tracing::debug!("{message}");
        }
    }
}
