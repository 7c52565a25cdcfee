//! Tests for commit timeouts and reconciliation

use crate::helpers::*;
use anyhow::Result;
use playtrack::core::cancel::CancelToken;
use playtrack::core::edit::{Completion, ReconcileCheck, Reconciliation, reconcile_commit};
use playtrack::core::error::{CommitResolution, ErrorKind, PublishError};
use playtrack::core::memory::{CommitBehavior, InMemoryBackend, Operation};
use playtrack::core::report::TaskReport;
use playtrack::core::task::{AssignmentTask, UploadTask, run_assignment, run_upload};
use playtrack::core::track::ReleaseTrack;
use std::collections::{BTreeMap, BTreeSet};

fn upload(workspace: &TestWorkspace) -> Result<UploadTask> {
  Ok(UploadTask {
    credential_name: "test-credential".to_string(),
    artifacts: workspace.artifacts(&["app.apk"])?,
    track: ReleaseTrack::Beta,
    rollout: fraction(100.0),
    expansion_files: BTreeMap::new(),
    inherit_expansion_files: false,
    recent_changes: Vec::new(),
  })
}

#[test]
fn test_timed_out_commit_that_landed_is_success() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 10)?;
  let task = upload(&workspace)?;

  let backend = InMemoryBackend::new();
  workspace.expect_uploads(&backend, &task.artifacts);
  backend.set_commit_behavior(CommitBehavior::TimeoutApplied);

  let mut report = TaskReport::new();
  let outcome = run_upload(&backend, &task, &CancelToken::new(), &mut report)?;

  assert_eq!(outcome.completion, Completion::Reconciled);
  assert_eq!(backend.call_count(Operation::Commit), 1);
  // Reconciliation only reads: one upload, one track update, one commit
  assert_eq!(backend.write_count(), 3);
  assert!(report.contains("checking whether Google Play received them"));
  assert!(report.contains("Changes were successfully applied to Google Play"));
  Ok(())
}

#[test]
fn test_timed_out_commit_that_was_lost_is_failure() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 10)?;
  let task = upload(&workspace)?;

  let backend = InMemoryBackend::new();
  workspace.expect_uploads(&backend, &task.artifacts);
  backend.set_commit_behavior(CommitBehavior::TimeoutNotApplied);

  let mut report = TaskReport::new();
  let err = run_upload(&backend, &task, &CancelToken::new(), &mut report).unwrap_err();

  match &err {
    PublishError::CommitTimeout { expected, resolution } => {
      assert_eq!(expected, &vec![10]);
      assert_eq!(resolution, &CommitResolution::NotApplied);
    }
    other => panic!("expected commit timeout, got {:?}", other),
  }
  assert_eq!(err.kind(), ErrorKind::CommitTimeout);
  assert!(err.remote_state_unchanged());
  assert_eq!(backend.call_count(Operation::Commit), 1);
  assert!(backend.committed_version_codes().is_empty());
  assert!(!report.contains("Changes were successfully applied"));
  Ok(())
}

#[test]
fn test_assignment_timeout_checks_the_track() -> Result<()> {
  let backend = InMemoryBackend::new()
    .with_artifact(6, "aa06")
    .with_track("alpha", &[6], None);
  backend.set_commit_behavior(CommitBehavior::TimeoutApplied);

  let task = AssignmentTask {
    credential_name: "test-credential".to_string(),
    application_id: "com.example".to_string(),
    version_codes: BTreeSet::from([6]),
    track: ReleaseTrack::Beta,
    rollout: fraction(100.0),
    dry_run: false,
  };
  let outcome = run_assignment(&backend, &task, &CancelToken::new(), &mut TaskReport::new())?;

  assert_eq!(outcome.completion, Completion::Reconciled);
  assert_eq!(backend.committed_track("beta").expect("beta").version_codes, vec![6]);
  Ok(())
}

#[test]
fn test_lost_fraction_change_is_not_reported_as_applied() -> Result<()> {
  let backend = InMemoryBackend::new()
    .with_artifact(10, "aa10")
    .with_track("rollout", &[10], Some(0.2));
  backend.set_commit_behavior(CommitBehavior::TimeoutNotApplied);

  let task = AssignmentTask {
    credential_name: "test-credential".to_string(),
    application_id: "com.example".to_string(),
    version_codes: BTreeSet::from([10]),
    track: ReleaseTrack::Production,
    rollout: fraction(50.0),
    dry_run: false,
  };
  let mut report = TaskReport::new();
  let err = run_assignment(&backend, &task, &CancelToken::new(), &mut report).unwrap_err();

  match &err {
    PublishError::CommitTimeout { resolution, .. } => assert_eq!(resolution, &CommitResolution::NotApplied),
    other => panic!("expected commit timeout, got {:?}", other),
  }
  assert_eq!(backend.committed_track("rollout").expect("rollout").user_fraction, Some(0.2));
  assert!(!report.contains("Changes were successfully applied"));
  Ok(())
}

#[test]
fn test_assignment_without_visible_change_stays_unresolved() -> Result<()> {
  let backend = InMemoryBackend::new().with_artifact(6, "aa06").with_track("beta", &[6], None);
  backend.set_commit_behavior(CommitBehavior::TimeoutApplied);

  let task = AssignmentTask {
    credential_name: "test-credential".to_string(),
    application_id: "com.example".to_string(),
    version_codes: BTreeSet::from([6]),
    track: ReleaseTrack::Beta,
    rollout: fraction(100.0),
    dry_run: false,
  };
  let err = run_assignment(&backend, &task, &CancelToken::new(), &mut TaskReport::new()).unwrap_err();

  assert!(matches!(
    &err,
    PublishError::CommitTimeout {
      resolution: CommitResolution::Unresolved { .. },
      ..
    }
  ));
  assert!(!err.remote_state_unchanged());
  Ok(())
}

#[test]
fn test_reconciling_twice_never_commits_again() -> Result<()> {
  let backend = InMemoryBackend::new().with_artifact(10, "aa10").with_artifact(11, "aa11");
  let check = ReconcileCheck::ArtifactsPresent(BTreeSet::from([10, 11]));
  let cancel = CancelToken::new();

  let first = reconcile_commit(&backend, "com.example", &check, &cancel);
  let second = reconcile_commit(&backend, "com.example", &check, &cancel);

  assert_eq!(first, Reconciliation::Committed);
  assert_eq!(second, Reconciliation::Committed);
  assert_eq!(backend.call_count(Operation::Commit), 0);
  assert_eq!(backend.write_count(), 0);
  Ok(())
}

#[test]
fn test_reconcile_needs_any_expected_version() -> Result<()> {
  let backend = InMemoryBackend::new().with_artifact(9, "aa09").with_artifact(10, "aa10");
  let cancel = CancelToken::new();

  let overlapping = ReconcileCheck::ArtifactsPresent(BTreeSet::from([10, 11]));
  assert_eq!(
    reconcile_commit(&backend, "com.example", &overlapping, &cancel),
    Reconciliation::Committed
  );

  let disjoint = ReconcileCheck::ArtifactsPresent(BTreeSet::from([11, 12]));
  assert_eq!(
    reconcile_commit(&backend, "com.example", &disjoint, &cancel),
    Reconciliation::NotApplied
  );
  Ok(())
}
