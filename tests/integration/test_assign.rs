//! Tests for direct track assignment

use crate::helpers::*;
use anyhow::Result;
use playtrack::core::api::ApiError;
use playtrack::core::assign::UpdateStep;
use playtrack::core::cancel::CancelToken;
use playtrack::core::edit::Completion;
use playtrack::core::error::{ErrorKind, PublishError};
use playtrack::core::memory::{InMemoryBackend, Operation};
use playtrack::core::report::TaskReport;
use playtrack::core::task::{AssignmentTask, run_assignment};
use playtrack::core::track::ReleaseTrack;

fn task(codes: &[u32], track: ReleaseTrack, percentage: f64) -> AssignmentTask {
  AssignmentTask {
    credential_name: "test-credential".to_string(),
    application_id: "com.example".to_string(),
    version_codes: codes.iter().copied().collect(),
    track,
    rollout: fraction(percentage),
    dry_run: false,
  }
}

fn released() -> InMemoryBackend {
  InMemoryBackend::new()
    .with_artifact(3, "aa03")
    .with_artifact(4, "aa04")
    .with_artifact(5, "aa05")
    .with_track("alpha", &[4, 5], None)
    .with_track("beta", &[3, 4], None)
}

#[test]
fn test_promote_to_production_evicts_lower_tracks() -> Result<()> {
  let backend = released();
  let mut report = TaskReport::new();

  let outcome = run_assignment(&backend, &task(&[4], ReleaseTrack::Production, 100.0), &CancelToken::new(), &mut report)?;

  // Direct assignment pivots one above the highest assigned version
  assert_eq!(outcome.plan.pivot, 5);
  assert_eq!(backend.committed_track("beta").expect("beta").version_codes, Vec::<u32>::new());
  assert_eq!(backend.committed_track("alpha").expect("alpha").version_codes, vec![5]);
  assert_eq!(backend.committed_track("production").expect("production").version_codes, vec![4]);
  assert!(report.contains("The production release track will now contain the APK(s): 4"));
  Ok(())
}

#[test]
fn test_staged_assignment_rejects_lower_percentage() -> Result<()> {
  let backend = released().with_track("rollout", &[3], Some(0.5));

  let err = run_assignment(
    &backend,
    &task(&[5], ReleaseTrack::Production, 10.0),
    &CancelToken::new(),
    &mut TaskReport::new(),
  )
  .unwrap_err();

  match &err {
    PublishError::RolloutPercentageReduction { current, requested } => {
      assert_eq!(*current, 0.5);
      assert_eq!(*requested, 0.1);
    }
    other => panic!("expected rollout reduction, got {:?}", other),
  }
  assert!(err.to_string().contains("from 50% to the configured 10%"));
  assert_eq!(backend.call_count(Operation::UpdateTrack), 0);
  assert!(err.remote_state_unchanged());
  Ok(())
}

#[test]
fn test_staged_assignment_can_increase_percentage() -> Result<()> {
  let backend = released().with_track("rollout", &[3], Some(0.1));

  let outcome = run_assignment(
    &backend,
    &task(&[5], ReleaseTrack::Production, 50.0),
    &CancelToken::new(),
    &mut TaskReport::new(),
  )?;

  let rollout = backend.committed_track("rollout").expect("rollout");
  assert_eq!(rollout.version_codes, vec![5]);
  assert_eq!(rollout.user_fraction, Some(0.5));
  assert_eq!(outcome.track, "rollout");
  Ok(())
}

#[test]
fn test_unknown_version_codes_are_listed() -> Result<()> {
  let backend = released();

  let err = run_assignment(
    &backend,
    &task(&[4, 40, 41], ReleaseTrack::Beta, 100.0),
    &CancelToken::new(),
    &mut TaskReport::new(),
  )
  .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::UnknownVersionCodes);
  assert!(err.to_string().contains("40, 41"));
  assert_eq!(backend.call_count(Operation::UpdateTrack), 0);
  Ok(())
}

#[test]
fn test_failure_after_first_update_is_partial() -> Result<()> {
  let backend = released();
  backend.fail_on_nth(
    Operation::UpdateTrack,
    2,
    ApiError::Status {
      code: 500,
      message: Some("Backend error".to_string()),
    },
  );

  let err = run_assignment(
    &backend,
    &task(&[5], ReleaseTrack::Production, 100.0),
    &CancelToken::new(),
    &mut TaskReport::new(),
  )
  .unwrap_err();

  match &err {
    PublishError::PartialAssignment { completed, source } => {
      assert_eq!(completed.len(), 1);
      assert_eq!(source.kind(), ErrorKind::Remote);
    }
    other => panic!("expected partial assignment, got {:?}", other),
  }
  assert_eq!(backend.call_count(Operation::Commit), 0);
  // Nothing was committed, so the account still shows the old tracks
  assert_eq!(backend.committed_track("beta").expect("beta").version_codes, vec![3, 4]);
  Ok(())
}

#[test]
fn test_dry_run_reports_plan_without_writes() -> Result<()> {
  let backend = released();
  let mut dry_run = task(&[5], ReleaseTrack::Production, 100.0);
  dry_run.dry_run = true;

  let outcome = run_assignment(&backend, &dry_run, &CancelToken::new(), &mut TaskReport::new())?;

  assert_eq!(outcome.completion, Completion::DryRun);
  let steps: Vec<UpdateStep> = outcome.plan.updates.iter().map(|u| u.step).collect();
  assert_eq!(steps, vec![UpdateStep::EvictBeta, UpdateStep::EvictAlpha, UpdateStep::Assign]);
  assert_eq!(backend.write_count(), 0);

  // The same request yields the same plan id
  let again = run_assignment(&backend, &dry_run, &CancelToken::new(), &mut TaskReport::new())?;
  assert_eq!(outcome.plan_id, again.plan_id);
  Ok(())
}
