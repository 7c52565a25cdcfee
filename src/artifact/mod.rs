//! Local artifacts: finding, inspecting and hashing APK files
//!
//! The core never reads APKs itself. Commands turn glob patterns into
//! [`LocalArtifact`]s here, through an [`ArtifactInspector`] (normally
//! [`aapt::SystemAapt`]), and hand the result to the core.

pub mod aapt;
pub mod hash;
pub mod locate;
pub mod obb;

use crate::core::error::{PublishError, PublishResult};
use crate::ui::progress::ArtifactProgress;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Metadata read from an APK container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
  pub application_id: String,
  pub version_code: u32,
  pub min_sdk_version: Option<u32>,
}

/// Reads application id, version code and minimum SDK from an APK
pub trait ArtifactInspector {
  fn inspect(&self, apk: &Path) -> PublishResult<ArtifactMetadata>;
}

/// An APK on disk, ready to upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalArtifact {
  pub path: PathBuf,
  /// Path relative to the directory it was found in, for display
  pub display_name: String,
  pub application_id: String,
  pub version_code: u32,
  /// Lower-case hex SHA-1
  pub content_hash: String,
  pub min_sdk_version: Option<u32>,
}

/// Inspect and hash each file in `relative_paths` (relative to `base_dir`)
pub fn load_artifacts(
  base_dir: &Path,
  relative_paths: &[String],
  inspector: &dyn ArtifactInspector,
  show_progress: bool,
) -> PublishResult<Vec<LocalArtifact>> {
  let mut progress = (show_progress && relative_paths.len() > 1)
    .then(|| ArtifactProgress::new(relative_paths.len(), "Inspecting APKs"));

  let mut artifacts = Vec::with_capacity(relative_paths.len());
  for relative in relative_paths {
    let path = base_dir.join(relative);
    let metadata = inspector.inspect(&path)?;
    let content_hash = hash::content_hash(&path)?;
    artifacts.push(LocalArtifact {
      path,
      display_name: relative.clone(),
      application_id: metadata.application_id,
      version_code: metadata.version_code,
      content_hash,
      min_sdk_version: metadata.min_sdk_version,
    });
    if let Some(progress) = progress.as_mut() {
      progress.inc();
    }
  }
  Ok(artifacts)
}

/// The application id every artifact shares
pub fn single_application_id(artifacts: &[LocalArtifact]) -> PublishResult<String> {
  let ids: BTreeSet<&str> = artifacts.iter().map(|a| a.application_id.as_str()).collect();
  match ids.len() {
    0 => Err(PublishError::message("No APK files were given")),
    1 => Ok(ids.into_iter().next().map(str::to_string).unwrap_or_default()),
    _ => {
      let mut message = String::from("Multiple APKs were found but they have inconsistent application IDs:");
      for id in ids {
        message.push_str("\n- ");
        message.push_str(id);
      }
      Err(PublishError::with_help(
        message,
        "Narrow the APK file pattern so it only matches one application",
      ))
    }
  }
}
