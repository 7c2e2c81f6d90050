//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Terminal progress for a `run`: a download spinner, then a fingerprint bar.
///
/// Bars start hidden and are only drawn once their stage begins, so every
/// method takes `&self` and the reporter can be shared with the rayon
/// workers that fingerprint files.
#[derive(Debug)]
pub struct ProgressReporter {
    pub download_pb: Option<ProgressBar>,
    pub fingerprint_pb: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Create progress reporter for a pipeline run
    pub fn new_for_run() -> Self {
        let download_pb = create_spinner("Downloading snapshot...");
        download_pb.set_draw_target(ProgressDrawTarget::hidden());
        let fingerprint_pb = create_progress_bar(0, "Fingerprinting files");
        fingerprint_pb.set_draw_target(ProgressDrawTarget::hidden());

        Self {
            download_pb: Some(download_pb),
            fingerprint_pb: Some(fingerprint_pb),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            download_pb: None,
            fingerprint_pb: None,
        }
    }

    pub fn start_download(&self, message: &str) {
        if let Some(pb) = &self.download_pb {
            pb.set_draw_target(ProgressDrawTarget::stderr());
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(100));
        }
    }

    pub fn finish_download(&self, message: &str) {
        if let Some(pb) = &self.download_pb {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Record `done` of `total` files fingerprinted
    pub fn update_fingerprints(&self, done: u64, total: u64) {
        if let Some(pb) = &self.fingerprint_pb {
            if pb.is_hidden() {
                pb.set_draw_target(ProgressDrawTarget::stderr());
            }
            pb.set_length(total);
            pb.set_position(done);
        }
    }

    /// Finish all progress bars
    pub fn finish_all(&self, message: &str) {
        for pb in [&self.download_pb, &self.fingerprint_pb].into_iter().flatten() {
            if pb.is_finished() || pb.is_hidden() {
                continue;
            }
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.download_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.fingerprint_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}
