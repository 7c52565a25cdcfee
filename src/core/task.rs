//! Upload and assignment tasks
//!
//! A task owns one edit from open to commit:
//!
//! ```text
//! upload:  open → register APKs → expansion files → assign → recent changes → commit
//! assign:  open → check versions exist → assign → commit
//! ```
//!
//! A commit timeout is settled by reconciliation before the task returns, so
//! callers only ever see success, `CommitTimeout` with a final resolution, or
//! an ordinary error.

use crate::artifact::{LocalArtifact, single_application_id};
use crate::core::api::PublisherApi;
use crate::core::assign::{
  AssignmentPlan, AssignmentRequest, EvictionPolicy, ReductionPolicy, TrackAssignmentEngine, plan_assignment,
};
use crate::core::cancel::CancelToken;
use crate::core::config::RecentChangesConfig;
use crate::core::edit::{Completion, EditSession, ReconcileCheck, settle_commit};
use crate::core::error::{PublishError, PublishResult};
use crate::core::expansion::{ExpansionAssociation, ExpansionFileAssociator, ExpansionFileSet, validate_expansion_files};
use crate::core::registrar::ArtifactRegistrar;
use crate::core::report::TaskReport;
use crate::core::track::{ReleaseTrack, RolloutFraction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Everything an upload needs, already validated
#[derive(Debug, Clone)]
pub struct UploadTask {
  pub credential_name: String,
  pub artifacts: Vec<LocalArtifact>,
  pub track: ReleaseTrack,
  pub rollout: RolloutFraction,
  pub expansion_files: BTreeMap<u32, ExpansionFileSet>,
  pub inherit_expansion_files: bool,
  pub recent_changes: Vec<RecentChangesConfig>,
}

/// Moving existing versions to a track
#[derive(Debug, Clone)]
pub struct AssignmentTask {
  pub credential_name: String,
  pub application_id: String,
  pub version_codes: BTreeSet<u32>,
  pub track: ReleaseTrack,
  pub rollout: RolloutFraction,
  /// Plan only; nothing is written
  pub dry_run: bool,
}

/// Result of a successful task
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
  pub application_id: String,
  /// Track as Google Play reported it after the final update
  pub track: String,
  pub version_codes: Vec<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_fraction: Option<f64>,
  pub completion: Completion,
  pub plan_id: String,
  pub plan: AssignmentPlan,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub expansion_files: Vec<ExpansionAssociation>,
  pub notes: Vec<String>,
  pub finished_at: DateTime<Utc>,
}

fn authenticating(report: &mut TaskReport, credential_name: &str, application_id: &str) {
  report.line("Authenticating to Google Play API...");
  report.line(format!("- Credential:     {}", credential_name));
  report.line(format!("- Application ID: {}", application_id));
}

/// Upload APKs, attach expansion files, assign them to a track and commit
pub fn run_upload(
  api: &dyn PublisherApi,
  task: &UploadTask,
  cancel: &CancelToken,
  report: &mut TaskReport,
) -> PublishResult<TaskOutcome> {
  let application_id = single_application_id(&task.artifacts)?;
  validate_expansion_files(&task.expansion_files, task.inherit_expansion_files)?;

  authenticating(report, &task.credential_name, &application_id);
  let session = EditSession::open(api, &application_id, cancel)?;

  report.blank();
  report.line(format!(
    "Uploading {} APK(s) with application ID: {}",
    task.artifacts.len(),
    application_id
  ));
  let registrar = ArtifactRegistrar::new(&session)?;
  let registration = registrar.register(&task.artifacts, report)?;

  let mut expansion_files = Vec::new();
  if !task.expansion_files.is_empty() || task.inherit_expansion_files {
    let mut associator =
      ExpansionFileAssociator::new(&session, &registration.existing_version_codes, task.inherit_expansion_files);
    expansion_files = associator.associate(&registration.version_codes, &task.expansion_files, report)?;
  }

  report.blank();
  let request = AssignmentRequest {
    target: task.track,
    version_codes: registration.version_codes.clone(),
    rollout: task.rollout,
    eviction: EvictionPolicy::UploadDriven,
    reduction: ReductionPolicy::Clamp,
  };
  let (plan, final_state) = TrackAssignmentEngine::new(&session).assign(&request, report)?;

  if !task.recent_changes.is_empty() {
    report.blank();
    for version_code in &registration.version_codes {
      for changes in &task.recent_changes {
        report.line(format!(
          "- Setting recent changes for versionCode {} ({})",
          version_code, changes.language
        ));
        session.update_listing(*version_code, &changes.language, &changes.text)?;
      }
    }
  }

  report.blank();
  report.line("Applying changes to Google Play...");
  let commit = session.commit(&registration.version_codes);
  let completion = settle_commit(
    commit,
    api,
    &application_id,
    &ReconcileCheck::ArtifactsPresent(registration.version_codes.clone()),
    cancel,
    report,
  )?;
  report.line("Changes were successfully applied to Google Play");

  Ok(TaskOutcome {
    application_id,
    track: final_state.track,
    version_codes: final_state.version_codes,
    user_fraction: final_state.user_fraction,
    completion,
    plan_id: plan.id()?.as_str().to_string(),
    plan,
    expansion_files,
    notes: report.notes().to_vec(),
    finished_at: Utc::now(),
  })
}

/// Move existing versions to a track and commit
pub fn run_assignment(
  api: &dyn PublisherApi,
  task: &AssignmentTask,
  cancel: &CancelToken,
  report: &mut TaskReport,
) -> PublishResult<TaskOutcome> {
  authenticating(report, &task.credential_name, &task.application_id);
  let session = EditSession::open(api, &task.application_id, cancel)?;

  let existing: BTreeSet<u32> = session.list_artifacts()?.into_iter().map(|a| a.version_code).collect();
  let missing: Vec<u32> = task.version_codes.difference(&existing).copied().collect();
  if !missing.is_empty() {
    return Err(PublishError::UnknownVersionCodes {
      track: task.track.to_string(),
      missing,
    });
  }

  report.blank();
  report.line(format!(
    "Assigning {} APK(s) to the {} release track",
    task.version_codes.len(),
    task.track
  ));
  let request = AssignmentRequest {
    target: task.track,
    version_codes: task.version_codes.clone(),
    rollout: task.rollout,
    eviction: EvictionPolicy::DirectAssignment,
    reduction: ReductionPolicy::Reject,
  };
  let before = session.list_tracks()?;
  let plan = plan_assignment(&before, &request)?;
  for note in &plan.notes {
    report.note(note.clone());
  }
  let plan_id = plan.id()?;

  if task.dry_run {
    report.line(format!("Plan {} (dry run, nothing will be changed):", plan_id));
    for update in &plan.updates {
      report.line(update.describe());
    }
    let final_state = plan
      .final_state()
      .cloned()
      .ok_or_else(|| PublishError::message("Assignment plan contained no track updates"))?;
    return Ok(TaskOutcome {
      application_id: task.application_id.clone(),
      track: final_state.track,
      version_codes: final_state.version_codes,
      user_fraction: final_state.user_fraction,
      completion: Completion::DryRun,
      plan_id: plan_id.as_str().to_string(),
      plan,
      expansion_files: Vec::new(),
      notes: report.notes().to_vec(),
      finished_at: Utc::now(),
    });
  }

  let final_state = TrackAssignmentEngine::new(&session).apply(&plan, report)?;

  report.blank();
  report.line("Applying changes to Google Play...");
  let commit = session.commit(&task.version_codes);
  let check = ReconcileCheck::TracksMatch {
    expected: plan.final_tracks(),
    before,
  };
  let completion = settle_commit(commit, api, &task.application_id, &check, cancel, report)?;
  report.line("Changes were successfully applied to Google Play");

  Ok(TaskOutcome {
    application_id: task.application_id.clone(),
    track: final_state.track,
    version_codes: final_state.version_codes,
    user_fraction: final_state.user_fraction,
    completion,
    plan_id: plan_id.as_str().to_string(),
    plan,
    expansion_files: Vec::new(),
    notes: report.notes().to_vec(),
    finished_at: Utc::now(),
  })
}
