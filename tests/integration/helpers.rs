//! Test helpers for integration tests

use anyhow::{Context, Result};
use playtrack::artifact::{ArtifactInspector, ArtifactMetadata, LocalArtifact, load_artifacts};
use playtrack::core::error::{PublishError, PublishResult};
use playtrack::core::memory::InMemoryBackend;
use playtrack::core::track::RolloutFraction;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A temporary directory holding fake APKs and config
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
  inspector: FakeInspector,
}

impl TestWorkspace {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();
    Ok(Self {
      _root: root,
      path,
      inspector: FakeInspector::default(),
    })
  }

  /// Write a file, creating parent directories
  pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
    let path = self.path.join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
    Ok(path)
  }

  /// Write a fake APK whose metadata the workspace inspector will report
  pub fn add_apk(&mut self, relative: &str, application_id: &str, version_code: u32) -> Result<PathBuf> {
    let path = self.write_file(relative, &format!("apk {} {}", application_id, version_code))?;
    self.inspector.metadata.insert(
      path.clone(),
      ArtifactMetadata {
        application_id: application_id.to_string(),
        version_code,
        min_sdk_version: Some(21),
      },
    );
    Ok(path)
  }

  /// Inspect and hash the given APKs
  pub fn artifacts(&self, relative: &[&str]) -> Result<Vec<LocalArtifact>> {
    let relative: Vec<String> = relative.iter().map(|r| r.to_string()).collect();
    Ok(load_artifacts(&self.path, &relative, &self.inspector, false)?)
  }

  /// Tell `backend` which version code each uploaded APK gets
  pub fn expect_uploads(&self, backend: &InMemoryBackend, artifacts: &[LocalArtifact]) {
    for artifact in artifacts {
      backend.expect_upload(&artifact.content_hash, artifact.version_code);
    }
  }
}

/// Inspector answering from a table instead of running aapt
#[derive(Default)]
pub struct FakeInspector {
  metadata: HashMap<PathBuf, ArtifactMetadata>,
}

impl ArtifactInspector for FakeInspector {
  fn inspect(&self, apk: &Path) -> PublishResult<ArtifactMetadata> {
    self.metadata.get(apk).cloned().ok_or_else(|| PublishError::InvalidArtifact {
      path: apk.to_path_buf(),
      reason: "not a known test APK".to_string(),
    })
  }
}

pub fn fraction(percentage: f64) -> RolloutFraction {
  RolloutFraction::from_percentage(percentage).expect("valid percentage")
}

/// Run the playtrack binary with a clean token environment
pub fn playtrack(cwd: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_playtrack");
  let mut command = Command::new(bin);
  command
    .current_dir(cwd)
    .args(args)
    .env_remove("PLAYTRACK_ACCESS_TOKEN")
    .env_remove("PLAYTRACK_LOG");
  for (key, value) in envs {
    command.env(key, value);
  }
  command.output().context("Failed to run playtrack")
}

/// Run playtrack and require success
pub fn run_playtrack(cwd: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
  let output = playtrack(cwd, args, envs)?;
  if !output.status.success() {
    anyhow::bail!(
      "playtrack command failed: playtrack {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      String::from_utf8_lossy(&output.stdout),
      String::from_utf8_lossy(&output.stderr)
    );
  }
  Ok(output)
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}
