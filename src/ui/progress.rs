//! Progress indicators for inspecting local artifacts
//!
//! Uses `linya` for allocation-free progress bars

use linya::{Bar, Progress};

/// Progress bar over a batch of APK files
pub struct ArtifactProgress {
  progress: Progress,
  bar: Bar,
}

impl ArtifactProgress {
  /// Create a new progress bar
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
