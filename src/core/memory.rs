//! In-memory Google Play backend
//!
//! [`InMemoryBackend`] keeps a committed state plus one staged copy per open
//! edit, the way the real edits API does: writes land in the edit and only a
//! commit makes them visible to later edits. Every call is recorded, and
//! failures can be injected per operation, which is what the task tests drive.

use crate::artifact::hash::content_hash;
use crate::core::api::{ApiError, ExpansionFileInfo, ExpansionFileType, PublisherApi, RemoteArtifact, TrackState};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Kind of remote call, for counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  OpenEdit,
  ListArtifacts,
  UploadArtifact,
  ExpansionFile,
  UploadExpansionFile,
  ReferenceExpansionFile,
  ListTracks,
  UpdateTrack,
  UpdateListing,
  Commit,
}

impl Operation {
  /// Whether the call changes staged or committed state
  pub fn is_write(self) -> bool {
    matches!(
      self,
      Operation::UploadArtifact
        | Operation::UploadExpansionFile
        | Operation::ReferenceExpansionFile
        | Operation::UpdateTrack
        | Operation::UpdateListing
        | Operation::Commit
    )
  }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  OpenEdit,
  ListArtifacts,
  UploadArtifact { sha1: String },
  ExpansionFile { version_code: u32, file_type: ExpansionFileType },
  UploadExpansionFile { version_code: u32, file_type: ExpansionFileType },
  ReferenceExpansionFile {
    version_code: u32,
    file_type: ExpansionFileType,
    references_version: u32,
  },
  ListTracks,
  UpdateTrack(TrackState),
  UpdateListing { version_code: u32, language: String },
  Commit,
}

impl Call {
  pub fn operation(&self) -> Operation {
    match self {
      Call::OpenEdit => Operation::OpenEdit,
      Call::ListArtifacts => Operation::ListArtifacts,
      Call::UploadArtifact { .. } => Operation::UploadArtifact,
      Call::ExpansionFile { .. } => Operation::ExpansionFile,
      Call::UploadExpansionFile { .. } => Operation::UploadExpansionFile,
      Call::ReferenceExpansionFile { .. } => Operation::ReferenceExpansionFile,
      Call::ListTracks => Operation::ListTracks,
      Call::UpdateTrack(_) => Operation::UpdateTrack,
      Call::UpdateListing { .. } => Operation::UpdateListing,
      Call::Commit => Operation::Commit,
    }
  }
}

/// What the next commits do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitBehavior {
  /// Apply and acknowledge
  #[default]
  Acknowledge,
  /// Apply, then time out before acknowledging
  TimeoutApplied,
  /// Drop the edit and time out
  TimeoutNotApplied,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
  artifacts: Vec<RemoteArtifact>,
  tracks: BTreeMap<String, TrackState>,
  expansion_files: BTreeMap<(u32, ExpansionFileType), ExpansionFileInfo>,
  listings: BTreeMap<(u32, String), String>,
}

#[derive(Debug)]
struct Fault {
  operation: Operation,
  /// Matching calls to let through before failing
  skip: usize,
  error: ApiError,
}

#[derive(Debug, Default)]
struct State {
  committed: Snapshot,
  edits: HashMap<String, Snapshot>,
  next_edit: u32,
  calls: Vec<Call>,
  faults: Vec<Fault>,
  commit_behavior: CommitBehavior,
  upload_version_codes: HashMap<String, u32>,
}

/// Recording, fault-injecting implementation of [`PublisherApi`]
#[derive(Debug, Default)]
pub struct InMemoryBackend {
  state: RefCell<State>,
}

impl InMemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a committed APK
  pub fn with_artifact(self, version_code: u32, sha1: &str) -> Self {
    self.state.borrow_mut().committed.artifacts.push(RemoteArtifact {
      version_code,
      sha1: sha1.to_ascii_lowercase(),
    });
    self
  }

  /// Seed a committed track
  pub fn with_track(self, track: &str, version_codes: &[u32], user_fraction: Option<f64>) -> Self {
    let state = TrackState {
      track: track.to_string(),
      version_codes: version_codes.to_vec(),
      user_fraction,
    };
    self.state.borrow_mut().committed.tracks.insert(track.to_string(), state);
    self
  }

  /// Seed a committed expansion file
  pub fn with_expansion_file(self, version_code: u32, file_type: ExpansionFileType, info: ExpansionFileInfo) -> Self {
    self
      .state
      .borrow_mut()
      .committed
      .expansion_files
      .insert((version_code, file_type), info);
    self
  }

  /// Version code the backend reports for an upload with this SHA-1
  ///
  /// Unregistered uploads get one above the highest known version code.
  pub fn expect_upload(&self, sha1: &str, version_code: u32) {
    self
      .state
      .borrow_mut()
      .upload_version_codes
      .insert(sha1.to_ascii_lowercase(), version_code);
  }

  /// Fail the next call of `operation`
  pub fn fail_on(&self, operation: Operation, error: ApiError) {
    self.fail_on_nth(operation, 1, error);
  }

  /// Fail the `nth` (1-based) call of `operation` from now on
  pub fn fail_on_nth(&self, operation: Operation, nth: usize, error: ApiError) {
    self.state.borrow_mut().faults.push(Fault {
      operation,
      skip: nth.saturating_sub(1),
      error,
    });
  }

  pub fn set_commit_behavior(&self, behavior: CommitBehavior) {
    self.state.borrow_mut().commit_behavior = behavior;
  }

  pub fn calls(&self) -> Vec<Call> {
    self.state.borrow().calls.clone()
  }

  pub fn call_count(&self, operation: Operation) -> usize {
    self
      .state
      .borrow()
      .calls
      .iter()
      .filter(|c| c.operation() == operation)
      .count()
  }

  /// Number of calls that changed state, commits included
  pub fn write_count(&self) -> usize {
    self
      .state
      .borrow()
      .calls
      .iter()
      .filter(|c| c.operation().is_write())
      .count()
  }

  /// Every track update in call order
  pub fn track_updates(&self) -> Vec<TrackState> {
    self
      .state
      .borrow()
      .calls
      .iter()
      .filter_map(|c| match c {
        Call::UpdateTrack(track) => Some(track.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn committed_track(&self, track: &str) -> Option<TrackState> {
    self.state.borrow().committed.tracks.get(track).cloned()
  }

  pub fn committed_version_codes(&self) -> Vec<u32> {
    let mut codes: Vec<u32> = self
      .state
      .borrow()
      .committed
      .artifacts
      .iter()
      .map(|a| a.version_code)
      .collect();
    codes.sort_unstable();
    codes
  }

  pub fn committed_expansion_file(&self, version_code: u32, file_type: ExpansionFileType) -> Option<ExpansionFileInfo> {
    self
      .state
      .borrow()
      .committed
      .expansion_files
      .get(&(version_code, file_type))
      .cloned()
  }

  pub fn committed_listing(&self, version_code: u32, language: &str) -> Option<String> {
    self
      .state
      .borrow()
      .committed
      .listings
      .get(&(version_code, language.to_string()))
      .cloned()
  }

  /// Record the call and return an injected failure, if one is due
  fn enter(&self, call: Call) -> Result<(), ApiError> {
    let mut state = self.state.borrow_mut();
    let operation = call.operation();
    state.calls.push(call);

    let due = state.faults.iter_mut().position(|fault| {
      if fault.operation != operation {
        return false;
      }
      if fault.skip == 0 {
        return true;
      }
      fault.skip -= 1;
      false
    });
    match due {
      Some(index) => Err(state.faults.remove(index).error),
      None => Ok(()),
    }
  }

  fn with_edit<T>(&self, edit_id: &str, f: impl FnOnce(&mut Snapshot) -> Result<T, ApiError>) -> Result<T, ApiError> {
    let mut state = self.state.borrow_mut();
    let edit = state.edits.get_mut(edit_id).ok_or_else(|| ApiError::Status {
      code: 404,
      message: Some(format!("Edit '{}' does not exist or has expired", edit_id)),
    })?;
    f(edit)
  }
}

impl PublisherApi for InMemoryBackend {
  fn open_edit(&self, _application_id: &str) -> Result<String, ApiError> {
    self.enter(Call::OpenEdit)?;
    let mut state = self.state.borrow_mut();
    state.next_edit += 1;
    let edit_id = format!("edit-{}", state.next_edit);
    let snapshot = state.committed.clone();
    state.edits.insert(edit_id.clone(), snapshot);
    Ok(edit_id)
  }

  fn list_artifacts(&self, _application_id: &str, edit_id: &str) -> Result<Vec<RemoteArtifact>, ApiError> {
    self.enter(Call::ListArtifacts)?;
    self.with_edit(edit_id, |edit| Ok(edit.artifacts.clone()))
  }

  fn upload_artifact(&self, _application_id: &str, edit_id: &str, apk: &Path) -> Result<RemoteArtifact, ApiError> {
    let sha1 = content_hash(apk).map_err(|e| ApiError::Transport(e.to_string()))?;
    self.enter(Call::UploadArtifact { sha1: sha1.clone() })?;
    let registered = self.state.borrow().upload_version_codes.get(&sha1).copied();

    self.with_edit(edit_id, |edit| {
      if edit.artifacts.iter().any(|a| a.sha1 == sha1) {
        return Err(ApiError::Status {
          code: 403,
          message: Some("APK has already been uploaded".into()),
        });
      }
      let version_code = registered.unwrap_or_else(|| edit.artifacts.iter().map(|a| a.version_code).max().unwrap_or(0) + 1);
      if edit.artifacts.iter().any(|a| a.version_code == version_code) {
        return Err(ApiError::Status {
          code: 403,
          message: Some("APK specifies a version code that has already been used.".into()),
        });
      }
      let artifact = RemoteArtifact { version_code, sha1 };
      edit.artifacts.push(artifact.clone());
      Ok(artifact)
    })
  }

  fn expansion_file(
    &self,
    _application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
  ) -> Result<Option<ExpansionFileInfo>, ApiError> {
    self.enter(Call::ExpansionFile { version_code, file_type })?;
    self.with_edit(edit_id, |edit| Ok(edit.expansion_files.get(&(version_code, file_type)).cloned()))
  }

  fn upload_expansion_file(
    &self,
    _application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    file: &Path,
  ) -> Result<ExpansionFileInfo, ApiError> {
    self.enter(Call::UploadExpansionFile { version_code, file_type })?;
    let size = std::fs::metadata(file)
      .map_err(|e| ApiError::Transport(e.to_string()))?
      .len();
    self.with_edit(edit_id, |edit| {
      let info = ExpansionFileInfo::uploaded(size);
      edit.expansion_files.insert((version_code, file_type), info.clone());
      Ok(info)
    })
  }

  fn reference_expansion_file(
    &self,
    _application_id: &str,
    edit_id: &str,
    version_code: u32,
    file_type: ExpansionFileType,
    references_version: u32,
  ) -> Result<ExpansionFileInfo, ApiError> {
    self.enter(Call::ReferenceExpansionFile {
      version_code,
      file_type,
      references_version,
    })?;
    self.with_edit(edit_id, |edit| {
      let info = ExpansionFileInfo::reference(references_version);
      edit.expansion_files.insert((version_code, file_type), info.clone());
      Ok(info)
    })
  }

  fn list_tracks(&self, _application_id: &str, edit_id: &str) -> Result<Vec<TrackState>, ApiError> {
    self.enter(Call::ListTracks)?;
    self.with_edit(edit_id, |edit| Ok(edit.tracks.values().cloned().collect()))
  }

  fn update_track(&self, _application_id: &str, edit_id: &str, track: &TrackState) -> Result<TrackState, ApiError> {
    self.enter(Call::UpdateTrack(track.clone()))?;
    self.with_edit(edit_id, |edit| {
      let mut stored = track.clone();
      stored.version_codes.sort_unstable();
      edit.tracks.insert(stored.track.clone(), stored.clone());
      Ok(stored)
    })
  }

  fn update_listing(
    &self,
    _application_id: &str,
    edit_id: &str,
    version_code: u32,
    language: &str,
    recent_changes: &str,
  ) -> Result<(), ApiError> {
    self.enter(Call::UpdateListing {
      version_code,
      language: language.to_string(),
    })?;
    self.with_edit(edit_id, |edit| {
      edit
        .listings
        .insert((version_code, language.to_string()), recent_changes.to_string());
      Ok(())
    })
  }

  fn commit_edit(&self, _application_id: &str, edit_id: &str) -> Result<(), ApiError> {
    self.enter(Call::Commit)?;
    let mut state = self.state.borrow_mut();
    let staged = state.edits.remove(edit_id).ok_or_else(|| ApiError::Status {
      code: 404,
      message: Some(format!("Edit '{}' does not exist or has expired", edit_id)),
    })?;

    match state.commit_behavior {
      CommitBehavior::Acknowledge => {
        state.committed = staged;
        Ok(())
      }
      CommitBehavior::TimeoutApplied => {
        state.committed = staged;
        Err(ApiError::Timeout)
      }
      CommitBehavior::TimeoutNotApplied => Err(ApiError::Timeout),
    }
  }
}
