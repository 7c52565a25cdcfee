//! The single open edit of a task, its commit, and commit reconciliation
//!
//! Every remote call a task makes goes through [`EditSession`]. The session
//! checks the cancel token before each blocking call and classifies failures,
//! so the rest of the core only ever sees [`PublishError`].
//!
//! A commit that times out is ambiguous: Google may have applied it. The
//! session reports that as [`PublishError::CommitTimeout`] with
//! [`CommitResolution::Pending`], and [`settle_commit`] then runs
//! [`reconcile_commit`] against a fresh, read-only edit to decide.

use crate::core::api::{ApiError, ExpansionFileInfo, ExpansionFileType, PublisherApi, RemoteArtifact, TrackState};
use crate::core::cancel::CancelToken;
use crate::core::error::{CommitResolution, PublishError, PublishResult, classify_api_error};
use crate::core::report::TaskReport;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// An open Google Play edit
///
/// Consumed by [`EditSession::commit`]; an edit that is dropped without commit
/// is abandoned and expires server-side.
pub struct EditSession<'a> {
  api: &'a dyn PublisherApi,
  application_id: String,
  edit_id: String,
  cancel: CancelToken,
}

impl<'a> EditSession<'a> {
  /// Open a new edit for `application_id`
  pub fn open(api: &'a dyn PublisherApi, application_id: &str, cancel: &CancelToken) -> PublishResult<Self> {
    cancel.check()?;
    debug!(application_id, "opening edit");
    let edit_id = api.open_edit(application_id).map_err(classify_api_error)?;
    debug!(application_id, edit_id = %edit_id, "edit opened");
    Ok(Self {
      api,
      application_id: application_id.to_string(),
      edit_id,
      cancel: cancel.clone(),
    })
  }

  pub fn edit_id(&self) -> &str {
    &self.edit_id
  }

  fn guard(&self, operation: &str) -> PublishResult<()> {
    self.cancel.check()?;
    debug!(edit_id = %self.edit_id, operation, "remote call");
    Ok(())
  }

  pub fn list_artifacts(&self) -> PublishResult<Vec<RemoteArtifact>> {
    self.guard("list_artifacts")?;
    Ok(self.api.list_artifacts(&self.application_id, &self.edit_id)?)
  }

  pub fn upload_artifact(&self, apk: &Path) -> PublishResult<RemoteArtifact> {
    self.guard("upload_artifact")?;
    Ok(self.api.upload_artifact(&self.application_id, &self.edit_id, apk)?)
  }

  pub fn expansion_file(&self, version_code: u32, file_type: ExpansionFileType) -> PublishResult<Option<ExpansionFileInfo>> {
    self.guard("expansion_file")?;
    Ok(
      self
        .api
        .expansion_file(&self.application_id, &self.edit_id, version_code, file_type)?,
    )
  }

  pub fn upload_expansion_file(
    &self,
    version_code: u32,
    file_type: ExpansionFileType,
    file: &Path,
  ) -> PublishResult<ExpansionFileInfo> {
    self.guard("upload_expansion_file")?;
    Ok(
      self
        .api
        .upload_expansion_file(&self.application_id, &self.edit_id, version_code, file_type, file)?,
    )
  }

  pub fn reference_expansion_file(
    &self,
    version_code: u32,
    file_type: ExpansionFileType,
    references_version: u32,
  ) -> PublishResult<ExpansionFileInfo> {
    self.guard("reference_expansion_file")?;
    Ok(self.api.reference_expansion_file(
      &self.application_id,
      &self.edit_id,
      version_code,
      file_type,
      references_version,
    )?)
  }

  pub fn list_tracks(&self) -> PublishResult<Vec<TrackState>> {
    self.guard("list_tracks")?;
    Ok(self.api.list_tracks(&self.application_id, &self.edit_id)?)
  }

  pub fn update_track(&self, track: &TrackState) -> PublishResult<TrackState> {
    self.guard("update_track")?;
    Ok(self.api.update_track(&self.application_id, &self.edit_id, track)?)
  }

  pub fn update_listing(&self, version_code: u32, language: &str, recent_changes: &str) -> PublishResult<()> {
    self.guard("update_listing")?;
    Ok(
      self
        .api
        .update_listing(&self.application_id, &self.edit_id, version_code, language, recent_changes)?,
    )
  }

  /// Commit the edit
  ///
  /// A timeout is not a failure: it becomes `CommitTimeout` with a pending
  /// resolution carrying `expected` for reconciliation.
  pub fn commit(self, expected: &BTreeSet<u32>) -> PublishResult<()> {
    self.guard("commit_edit")?;
    match self.api.commit_edit(&self.application_id, &self.edit_id) {
      Ok(()) => Ok(()),
      Err(ApiError::Timeout) => {
        warn!(edit_id = %self.edit_id, "commit timed out; outcome unknown");
        Err(PublishError::CommitTimeout {
          expected: expected.iter().copied().collect(),
          resolution: CommitResolution::Pending,
        })
      }
      Err(err) => Err(classify_api_error(err)),
    }
  }
}

/// What a fresh edit must show for a timed-out commit to count as applied
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileCheck {
  /// At least one of these version codes now exists; commits are atomic, so
  /// one is enough
  ArtifactsPresent(BTreeSet<u32>),
  /// Every track in `expected` now matches exactly
  ///
  /// `before` is what the edit saw when it was opened. When no expected track
  /// differs from it, a fresh read cannot tell an applied commit from a lost
  /// one and the outcome stays unresolved.
  TracksMatch {
    expected: Vec<TrackState>,
    before: Vec<TrackState>,
  },
}

/// Whether `observed` holds the same versions and fraction as `expected`
///
/// A missing track counts as empty, and empty tracks match whatever fraction
/// they carry.
fn track_matches(expected: &TrackState, observed: Option<&TrackState>) -> bool {
  let expected_codes: BTreeSet<u32> = expected.version_codes.iter().copied().collect();
  let observed_codes: BTreeSet<u32> = observed
    .map(|t| t.version_codes.iter().copied().collect())
    .unwrap_or_default();
  if expected_codes != observed_codes {
    return false;
  }
  expected_codes.is_empty() || expected.user_fraction == observed.and_then(|t| t.user_fraction)
}

fn find_track<'t>(tracks: &'t [TrackState], name: &str) -> Option<&'t TrackState> {
  tracks.iter().find(|t| t.track == name)
}

/// Outcome of reconciling a timed-out commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
  Committed,
  NotApplied,
  /// The reads failed or could not tell; the commit outcome stays unknown
  Unresolved(String),
}

/// Decide whether a timed-out commit was applied
///
/// Opens a new edit and only reads from it. The edit is never committed, so
/// this can run any number of times without side effects.
pub fn reconcile_commit(
  api: &dyn PublisherApi,
  application_id: &str,
  check: &ReconcileCheck,
  cancel: &CancelToken,
) -> Reconciliation {
  let observe = || -> PublishResult<bool> {
    let session = EditSession::open(api, application_id, cancel)?;
    match check {
      ReconcileCheck::ArtifactsPresent(expected) => {
        let observed = session.list_artifacts()?;
        Ok(observed.iter().any(|a| expected.contains(&a.version_code)))
      }
      ReconcileCheck::TracksMatch { expected, before } => {
        if expected
          .iter()
          .all(|track| track_matches(track, find_track(before, &track.track)))
        {
          return Err(PublishError::message(
            "the planned tracks already matched Google Play before the edit",
          ));
        }
        let observed = session.list_tracks()?;
        Ok(
          expected
            .iter()
            .all(|track| track_matches(track, find_track(&observed, &track.track))),
        )
      }
    }
  };

  match observe() {
    Ok(true) => Reconciliation::Committed,
    Ok(false) => Reconciliation::NotApplied,
    Err(err) => {
      warn!(error = %err, "reconciliation failed");
      Reconciliation::Unresolved(err.to_string())
    }
  }
}

/// How a task's changes reached Google Play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
  /// The commit was acknowledged
  Committed,
  /// The commit timed out but a fresh edit showed it was applied
  Reconciled,
  /// Nothing was written
  DryRun,
}

/// Turn a commit result into the task's final outcome, reconciling a timeout
pub fn settle_commit(
  result: PublishResult<()>,
  api: &dyn PublisherApi,
  application_id: &str,
  check: &ReconcileCheck,
  cancel: &CancelToken,
  report: &mut TaskReport,
) -> PublishResult<Completion> {
  match result {
    Ok(()) => Ok(Completion::Committed),
    Err(PublishError::CommitTimeout {
      expected,
      resolution: CommitResolution::Pending,
    }) => {
      report.line("- Applying changes timed out; checking whether Google Play received them...");
      match reconcile_commit(api, application_id, check, cancel) {
        Reconciliation::Committed => {
          report.note("- Google Play confirms the changes were applied despite the timeout");
          Ok(Completion::Reconciled)
        }
        Reconciliation::NotApplied => Err(PublishError::CommitTimeout {
          expected,
          resolution: CommitResolution::NotApplied,
        }),
        Reconciliation::Unresolved(reason) => Err(PublishError::CommitTimeout {
          expected,
          resolution: CommitResolution::Unresolved { reason },
        }),
      }
    }
    Err(err) => Err(err),
  }
}
