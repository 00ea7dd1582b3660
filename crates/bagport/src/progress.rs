// crates/bagport/src/progress.rs

use bagport_core::progress::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Terminal progress bar fed by the pipeline's status updates. indicatif
/// already throttles redraws, so every update can be forwarded as-is.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=> "),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("export complete");
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, processed: u64, total: u64, label: &str) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(processed);
        self.bar.set_message(label.to_string());
    }
}
