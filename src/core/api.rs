//! The remote capability the core publishes through
//!
//! [`PublisherApi`] mirrors the Google Play Developer API edits model. All
//! methods take `&self` and return [`ApiError`] unclassified; classification
//! into [`PublishError`](crate::core::error::PublishError) happens in the edit
//! session so every backend is reported the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// An APK known to Google Play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
  pub version_code: u32,
  /// Lower-case hex SHA-1 of the APK contents
  pub sha1: String,
}

/// Expansion file slot of an APK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionFileType {
  Main,
  Patch,
}

impl ExpansionFileType {
  pub const ALL: [ExpansionFileType; 2] = [ExpansionFileType::Main, ExpansionFileType::Patch];

  pub fn api_value(self) -> &'static str {
    match self {
      ExpansionFileType::Main => "main",
      ExpansionFileType::Patch => "patch",
    }
  }
}

impl fmt::Display for ExpansionFileType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.api_value())
  }
}

/// Expansion file attached to one `(version_code, type)` pair
///
/// Either a real upload (`file_size`) or a pointer to another version's file
/// (`references_version`); the backend never populates both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionFileInfo {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file_size: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub references_version: Option<u32>,
}

impl ExpansionFileInfo {
  /// A directly uploaded file
  pub fn uploaded(file_size: u64) -> Self {
    Self {
      file_size: Some(file_size),
      references_version: None,
    }
  }

  /// A reference to another version's file
  pub fn reference(version_code: u32) -> Self {
    Self {
      file_size: None,
      references_version: Some(version_code),
    }
  }
}

/// Whole-set state of one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackState {
  pub track: String,
  #[serde(default)]
  pub version_codes: Vec<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_fraction: Option<f64>,
}

impl TrackState {
  pub fn new(track: impl Into<String>, version_codes: Vec<u32>) -> Self {
    Self {
      track: track.into(),
      version_codes,
      user_fraction: None,
    }
  }

  pub fn with_fraction(mut self, fraction: f64) -> Self {
    self.user_fraction = Some(fraction);
    self
  }
}

/// Failure of a single remote call, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
  /// The server answered with a non-2xx status
  Status { code: u16, message: Option<String> },
  /// No response arrived before the client timeout
  Timeout,
  /// Connection, TLS or decoding failure
  Transport(String),
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ApiError::Status { code, message: Some(m) } => write!(f, "HTTP {}: {}", code, m),
      ApiError::Status { code, message: None } => write!(f, "HTTP {}", code),
      ApiError::Timeout => write!(f, "request timed out"),
      ApiError::Transport(reason) => write!(f, "{}", reason),
    }
  }
}

impl std::error::Error for ApiError {}

/// Google Play edits API, as seen by the core
///
/// Object safe so backends can be swapped behind `&dyn PublisherApi`.
pub trait PublisherApi {
  /// Open a new edit and return its id
  fn open_edit(&self, application_id: &str) -> Result<String, ApiError>;

  fn list_artifacts(&self, application_id: &str, edit_id: &str) -> Result<Vec<RemoteArtifact>, ApiError>;

  /// Upload an APK; the backend reports the version code it parsed
  fn upload_artifact(&self, application_id: &str, edit_id: &str, apk: &Path) -> Result<RemoteArtifact, ApiError>;

  /// `Ok(None)` when the version has no file of this type
  fn expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
  ) -> Result<Option<ExpansionFileInfo>, ApiError>;

  fn upload_expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    file: &Path,
  ) -> Result<ExpansionFileInfo, ApiError>;

  fn reference_expansion_file(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    references_version: u32,
  ) -> Result<ExpansionFileInfo, ApiError>;

  fn list_tracks(&self, application_id: &str, edit_id: &str) -> Result<Vec<TrackState>, ApiError>;

  /// Replace a track's contents; returns the state the backend stored
  fn update_track(&self, application_id: &str, edit_id: &str, track: &TrackState) -> Result<TrackState, ApiError>;

  /// Set the "recent changes" text of one APK for one language
  fn update_listing(
    &self,
    application_id: &str,
    edit_id: &str,
    version_code: u32,
    language: &str,
    recent_changes: &str,
  ) -> Result<(), ApiError>;

  fn commit_edit(&self, application_id: &str, edit_id: &str) -> Result<(), ApiError>;
}
