//! APK inspection through the Android `aapt` tool
//!
//! Runs `aapt dump badging <apk>` and reads the package line and the minimum
//! SDK line from its output.

use crate::artifact::{ArtifactInspector, ArtifactMetadata};
use crate::core::error::{PublishError, PublishResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

static PACKAGE_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^package:.*?\bname='([^']+)'").expect("valid package regex"));
static VERSION_CODE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^package:.*?\bversionCode='([0-9]+)'").expect("valid versionCode regex"));
static MIN_SDK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^sdkVersion:'([0-9]+)'").expect("valid sdkVersion regex"));

/// Inspector backed by the system `aapt` binary
pub struct SystemAapt {
  program: PathBuf,
}

impl SystemAapt {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self { program: program.into() }
  }
}

impl ArtifactInspector for SystemAapt {
  fn inspect(&self, apk: &Path) -> PublishResult<ArtifactMetadata> {
    let output = Command::new(&self.program)
      .args(["dump", "badging"])
      .arg(apk)
      .output()
      .map_err(|e| {
        PublishError::with_help(
          format!("Failed to execute {}: {}", self.program.display(), e),
          "Install the Android build-tools, or set [tools] aapt in playtrack.toml to the aapt binary",
        )
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(PublishError::InvalidArtifact {
        path: apk.to_path_buf(),
        reason: stderr.trim().to_string(),
      });
    }

    parse_badging(&String::from_utf8_lossy(&output.stdout)).map_err(|reason| PublishError::InvalidArtifact {
      path: apk.to_path_buf(),
      reason,
    })
  }
}

/// Parse `aapt dump badging` output
pub fn parse_badging(output: &str) -> Result<ArtifactMetadata, String> {
  let mut application_id = None;
  let mut version_code = None;
  let mut min_sdk_version = None;

  for line in output.lines() {
    if let Some(caps) = PACKAGE_NAME.captures(line) {
      application_id = Some(caps[1].to_string());
    }
    if let Some(caps) = VERSION_CODE.captures(line) {
      version_code = caps[1].parse::<u32>().ok();
    }
    if let Some(caps) = MIN_SDK.captures(line) {
      min_sdk_version = caps[1].parse::<u32>().ok();
    }
  }

  let application_id = application_id.ok_or("no package name in aapt output")?;
  let version_code = version_code.ok_or("no versionCode in aapt output")?;
  Ok(ArtifactMetadata {
    application_id,
    version_code,
    min_sdk_version,
  })
}
