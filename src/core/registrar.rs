//! Uploading APKs into an open edit
//!
//! The registrar lists the application's APKs once, refuses the whole batch if
//! any candidate is already on Google Play (same SHA-1), then uploads each file
//! and checks that Google parsed the version code we parsed locally.

use crate::artifact::LocalArtifact;
use crate::core::api::RemoteArtifact;
use crate::core::edit::EditSession;
use crate::core::error::{PublishError, PublishResult};
use crate::core::report::TaskReport;
use std::collections::BTreeSet;

/// Version codes produced by a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
  /// Newly uploaded, ascending
  pub version_codes: BTreeSet<u32>,
  /// Everything the application had before this task
  pub existing_version_codes: Vec<u32>,
}

pub struct ArtifactRegistrar<'s, 'a> {
  session: &'s EditSession<'a>,
  existing: Vec<RemoteArtifact>,
}

impl<'s, 'a> ArtifactRegistrar<'s, 'a> {
  /// Fetch the application's current APKs for the rest of the task
  pub fn new(session: &'s EditSession<'a>) -> PublishResult<Self> {
    let existing = session.list_artifacts()?;
    Ok(Self { session, existing })
  }

  pub fn existing_version_codes(&self) -> Vec<u32> {
    self.existing.iter().map(|a| a.version_code).collect()
  }

  /// Find the first candidate that Google Play already has
  fn find_duplicate(&self, artifacts: &[LocalArtifact]) -> Option<PublishError> {
    artifacts.iter().find_map(|candidate| {
      self
        .existing
        .iter()
        .find(|remote| remote.sha1.eq_ignore_ascii_case(&candidate.content_hash))
        .map(|remote| PublishError::DuplicateArtifact {
          file: candidate.display_name.clone(),
          version_code: remote.version_code,
          sha1: candidate.content_hash.clone(),
        })
    })
  }

  /// Upload every artifact, or none if any of them is a duplicate
  pub fn register(&self, artifacts: &[LocalArtifact], report: &mut TaskReport) -> PublishResult<Registration> {
    if let Some(duplicate) = self.find_duplicate(artifacts) {
      return Err(duplicate);
    }

    let mut version_codes = BTreeSet::new();
    for artifact in artifacts {
      report.blank();
      report.line(format!("      APK file: {}", artifact.display_name));
      report.line(format!("    SHA-1 hash: {}", artifact.content_hash));
      report.line(format!("   versionCode: {}", artifact.version_code));
      if let Some(min_sdk) = artifact.min_sdk_version {
        report.line(format!(" minSdkVersion: {}", min_sdk));
      }

      let uploaded = self.session.upload_artifact(&artifact.path)?;
      if uploaded.version_code != artifact.version_code {
        return Err(PublishError::Consistency {
          file: artifact.display_name.clone(),
          expected: artifact.version_code,
          actual: uploaded.version_code,
        });
      }
      version_codes.insert(uploaded.version_code);
    }

    Ok(Registration {
      version_codes,
      existing_version_codes: self.existing_version_codes(),
    })
  }
}
