//! CLI commands for playtrack
//!
//! - **upload**: Upload APKs (and expansion files) and assign them to a track
//! - **assign**: Move APKs already on Google Play to a track
//! - **check**: Validate configuration and credentials, optionally against Google Play
//!
//! Each command loads `playtrack.toml` (if any), lets flags override it, and
//! hands a validated task to [`crate::core::task`].

pub mod assign;
pub mod check;
pub mod upload;

pub use assign::{AssignArgs, run_assign};
pub use check::{CheckArgs, run_check};
pub use upload::{UploadArgs, run_upload};

use crate::artifact::aapt::SystemAapt;
use crate::artifact::locate::find_files;
use crate::artifact::{LocalArtifact, load_artifacts};
use crate::core::config::{PercentageValue, PublishConfig};
use crate::core::error::{PublishError, PublishResult};
use crate::core::report::TaskReport;
use crate::core::task::TaskOutcome;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration plus the directory patterns are resolved against
pub(crate) struct LoadedConfig {
  pub base_dir: PathBuf,
  pub path: Option<PathBuf>,
  pub config: PublishConfig,
}

/// Load an explicit config file, or search the current directory
///
/// Patterns in an explicit file are relative to the file's directory.
pub(crate) fn load_config(explicit: Option<&Path>) -> PublishResult<LoadedConfig> {
  match explicit {
    Some(path) => {
      let config = PublishConfig::load_file(path)?;
      let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => env::current_dir()?,
      };
      Ok(LoadedConfig {
        base_dir,
        path: Some(path.to_path_buf()),
        config,
      })
    }
    None => {
      let base_dir = env::current_dir()?;
      let path = PublishConfig::find_config_path(&base_dir);
      let config = PublishConfig::load_or_default(&base_dir)?;
      Ok(LoadedConfig { base_dir, path, config })
    }
  }
}

impl LoadedConfig {
  /// Find, inspect and hash the APKs matching `patterns`
  pub fn artifacts(&self, patterns: &str, show_progress: bool) -> PublishResult<Vec<LocalArtifact>> {
    let files = find_files(&self.base_dir, patterns)?;
    if files.is_empty() {
      return Err(PublishError::with_help(
        format!("No APK files matched '{}'", patterns),
        format!("Patterns are relative to {}", self.base_dir.display()),
      ));
    }
    let inspector = SystemAapt::new(&self.config.tools.aapt);
    load_artifacts(&self.base_dir, &files, &inspector, show_progress)
  }
}

pub(crate) fn percentage_flag(value: Option<String>) -> Option<PercentageValue> {
  value.map(PercentageValue::Text)
}

/// A report that prints as it goes, unless the output is JSON
pub(crate) fn task_report(json: bool) -> TaskReport {
  if json { TaskReport::new() } else { TaskReport::echoing() }
}

pub(crate) fn print_outcome(outcome: &TaskOutcome, json: bool) -> PublishResult<()> {
  if json {
    let output = serde_json::to_string_pretty(outcome)
      .map_err(|e| PublishError::message(format!("Failed to serialize JSON: {}", e)))?;
    println!("{}", output);
  }
  Ok(())
}
