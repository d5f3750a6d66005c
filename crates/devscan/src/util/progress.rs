use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for scans, where the total file count is unknown up front.
pub fn create_scan_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .expect("Failed to create spinner template"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
