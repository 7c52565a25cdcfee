//! Tests for the upload task

use crate::helpers::*;
use anyhow::Result;
use playtrack::core::api::{ExpansionFileInfo, ExpansionFileType};
use playtrack::core::cancel::CancelToken;
use playtrack::core::config::RecentChangesConfig;
use playtrack::core::edit::Completion;
use playtrack::core::error::{ErrorKind, PublishError};
use playtrack::core::expansion::ExpansionFileSet;
use playtrack::core::memory::{InMemoryBackend, Operation};
use playtrack::core::report::TaskReport;
use playtrack::core::task::{UploadTask, run_upload};
use playtrack::core::track::ReleaseTrack;
use std::collections::BTreeMap;

fn upload_task(workspace: &TestWorkspace, apks: &[&str], track: ReleaseTrack, percentage: f64) -> Result<UploadTask> {
  Ok(UploadTask {
    credential_name: "test-credential".to_string(),
    artifacts: workspace.artifacts(apks)?,
    track,
    rollout: fraction(percentage),
    expansion_files: BTreeMap::new(),
    inherit_expansion_files: false,
    recent_changes: Vec::new(),
  })
}

#[test]
fn test_staged_production_upload() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app-arm.apk", "com.example.game", 10)?;
  workspace.add_apk("app-x86.apk", "com.example.game", 11)?;

  let backend = InMemoryBackend::new()
    .with_artifact(8, "aa08")
    .with_artifact(9, "aa09")
    .with_track("alpha", &[8, 9], None)
    .with_track("beta", &[9], None)
    .with_track("production", &[7], None);
  let task = upload_task(&workspace, &["app-arm.apk", "app-x86.apk"], ReleaseTrack::Production, 50.0)?;
  workspace.expect_uploads(&backend, &task.artifacts);

  let mut report = TaskReport::new();
  let outcome = run_upload(&backend, &task, &CancelToken::new(), &mut report)?;

  assert_eq!(outcome.completion, Completion::Committed);
  assert_eq!(outcome.track, "rollout");
  assert_eq!(outcome.version_codes, vec![10, 11]);
  assert_eq!(outcome.user_fraction, Some(0.5));

  let updates = backend.track_updates();
  let rollout: Vec<_> = updates.iter().filter(|u| u.track == "rollout").collect();
  assert_eq!(rollout.len(), 1);
  assert_eq!(rollout[0].version_codes, vec![10, 11]);
  assert_eq!(rollout[0].user_fraction, Some(0.5));

  for track in ["alpha", "beta"] {
    let state = backend.committed_track(track).expect("track exists");
    assert!(state.version_codes.iter().all(|vc| *vc >= 10), "{} kept {:?}", track, state.version_codes);
  }
  assert_eq!(backend.committed_version_codes(), vec![8, 9, 10, 11]);
  assert_eq!(backend.call_count(Operation::Commit), 1);

  assert_eq!(report.lines()[0], "Authenticating to Google Play API...");
  assert!(report.contains("- Credential:     test-credential"));
  assert!(report.contains("- Application ID: com.example.game"));
  assert!(report.contains("Changes were successfully applied to Google Play"));
  Ok(())
}

#[test]
fn test_production_upload_replaces_staged_rollout() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 12)?;

  let backend = InMemoryBackend::new()
    .with_artifact(11, "aa11")
    .with_track("rollout", &[11], Some(0.2))
    .with_track("production", &[10], None);
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Production, 100.0)?;
  workspace.expect_uploads(&backend, &task.artifacts);

  run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new())?;

  assert!(backend.committed_track("rollout").expect("rollout").version_codes.is_empty());
  let production = backend.committed_track("production").expect("production");
  assert_eq!(production.version_codes, vec![12]);
  assert_eq!(production.user_fraction, None);
  Ok(())
}

#[test]
fn test_upload_keeps_existing_rollout_fraction() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 12)?;

  let backend = InMemoryBackend::new()
    .with_artifact(11, "aa11")
    .with_track("rollout", &[11], Some(0.2));
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Production, 10.0)?;
  workspace.expect_uploads(&backend, &task.artifacts);

  let mut report = TaskReport::new();
  let outcome = run_upload(&backend, &task, &CancelToken::new(), &mut report)?;

  assert_eq!(outcome.user_fraction, Some(0.2));
  let rollout = backend.committed_track("rollout").expect("rollout");
  assert_eq!(rollout.version_codes, vec![12]);
  assert_eq!(rollout.user_fraction, Some(0.2));
  assert!(report.notes().iter().any(|n| n.contains("will remain at 20%")));
  Ok(())
}

#[test]
fn test_staged_upload_clears_existing_rollout_first() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 12)?;

  let backend = InMemoryBackend::new()
    .with_artifact(11, "aa11")
    .with_track("beta", &[11], None)
    .with_track("rollout", &[11], Some(0.1));
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Production, 50.0)?;
  workspace.expect_uploads(&backend, &task.artifacts);

  run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new())?;

  let updates: Vec<(String, Vec<u32>, Option<f64>)> = backend
    .track_updates()
    .into_iter()
    .map(|t| (t.track, t.version_codes, t.user_fraction))
    .collect();
  assert_eq!(
    updates,
    vec![
      ("beta".to_string(), vec![], None),
      ("rollout".to_string(), vec![], None),
      ("rollout".to_string(), vec![12], Some(0.5)),
    ]
  );
  Ok(())
}

#[test]
fn test_duplicate_apk_is_rejected_before_upload() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 4)?;
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Beta, 100.0)?;

  let backend = InMemoryBackend::new().with_artifact(3, &task.artifacts[0].content_hash.to_uppercase());
  let err = run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::DuplicateArtifact);
  assert_eq!(backend.call_count(Operation::UploadArtifact), 0);
  assert_eq!(backend.write_count(), 0);
  assert!(err.remote_state_unchanged());
  Ok(())
}

#[test]
fn test_version_code_mismatch_stops_upload() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 10)?;
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Alpha, 100.0)?;

  let backend = InMemoryBackend::new();
  backend.expect_upload(&task.artifacts[0].content_hash, 99);
  let err = run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new()).unwrap_err();

  match err {
    PublishError::Consistency { expected, actual, .. } => {
      assert_eq!(expected, 10);
      assert_eq!(actual, 99);
    }
    other => panic!("expected consistency error, got {:?}", other),
  }
  assert_eq!(backend.call_count(Operation::UpdateTrack), 0);
  assert_eq!(backend.call_count(Operation::Commit), 0);
  Ok(())
}

#[test]
fn test_inconsistent_application_ids_fail_before_any_call() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("one.apk", "com.example.one", 1)?;
  workspace.add_apk("two.apk", "com.example.two", 2)?;
  let task = upload_task(&workspace, &["one.apk", "two.apk"], ReleaseTrack::Alpha, 100.0)?;

  let backend = InMemoryBackend::new();
  let err = run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new()).unwrap_err();

  let message = err.to_string();
  assert!(message.contains("inconsistent application IDs"));
  assert!(message.contains("- com.example.one"));
  assert!(message.contains("- com.example.two"));
  assert!(backend.calls().is_empty());
  Ok(())
}

#[test]
fn test_missing_main_expansion_file_fails_before_any_call() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 10)?;
  let patch = workspace.write_file("patch.10.com.example.obb", "patch")?;
  let mut task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Alpha, 100.0)?;
  let mut files = ExpansionFileSet::default();
  files.set(ExpansionFileType::Patch, patch);
  task.expansion_files.insert(10, files);

  let backend = InMemoryBackend::new();
  let err = run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::MissingMainExpansionFile);
  assert!(backend.calls().is_empty());
  Ok(())
}

#[test]
fn test_expansion_files_uploaded_and_inherited() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app-7.apk", "com.example", 7)?;
  workspace.add_apk("app-8.apk", "com.example", 8)?;
  let main = workspace.write_file("obb/main.8.com.example.obb", "main expansion")?;

  let backend = InMemoryBackend::new()
    .with_artifact(5, "aa05")
    .with_artifact(6, "aa06")
    .with_expansion_file(5, ExpansionFileType::Main, ExpansionFileInfo::uploaded(4096));
  let mut task = upload_task(&workspace, &["app-7.apk", "app-8.apk"], ReleaseTrack::Alpha, 100.0)?;
  let mut files = ExpansionFileSet::default();
  files.set(ExpansionFileType::Main, main);
  task.expansion_files.insert(8, files);
  task.inherit_expansion_files = true;
  workspace.expect_uploads(&backend, &task.artifacts);

  let mut report = TaskReport::new();
  let outcome = run_upload(&backend, &task, &CancelToken::new(), &mut report)?;

  assert_eq!(
    backend.committed_expansion_file(7, ExpansionFileType::Main),
    Some(ExpansionFileInfo::reference(5))
  );
  assert_eq!(
    backend.committed_expansion_file(8, ExpansionFileType::Main),
    Some(ExpansionFileInfo::uploaded("main expansion".len() as u64))
  );
  assert!(backend.committed_expansion_file(7, ExpansionFileType::Patch).is_none());
  assert_eq!(outcome.expansion_files.len(), 4);
  assert!(report.contains("- Applying main expansion file from previous APK: 5"));
  assert!(report.contains("- Uploading new main expansion file"));
  Ok(())
}

#[test]
fn test_recent_changes_for_every_new_version() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("a.apk", "com.example", 20)?;
  workspace.add_apk("b.apk", "com.example", 21)?;

  let backend = InMemoryBackend::new();
  let mut task = upload_task(&workspace, &["a.apk", "b.apk"], ReleaseTrack::Beta, 100.0)?;
  task.recent_changes = vec![
    RecentChangesConfig {
      language: "en-US".to_string(),
      text: "Bug fixes".to_string(),
    },
    RecentChangesConfig {
      language: "de-DE".to_string(),
      text: "Fehlerbehebungen".to_string(),
    },
  ];
  workspace.expect_uploads(&backend, &task.artifacts);

  run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new())?;

  for version_code in [20, 21] {
    assert_eq!(backend.committed_listing(version_code, "en-US").as_deref(), Some("Bug fixes"));
    assert_eq!(
      backend.committed_listing(version_code, "de-DE").as_deref(),
      Some("Fehlerbehebungen")
    );
  }
  assert_eq!(backend.call_count(Operation::UpdateListing), 4);
  Ok(())
}

#[test]
fn test_non_production_rollout_is_ignored_with_notice() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 3)?;

  let backend = InMemoryBackend::new();
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Beta, 20.0)?;
  workspace.expect_uploads(&backend, &task.artifacts);

  let outcome = run_upload(&backend, &task, &CancelToken::new(), &mut TaskReport::new())?;

  assert_eq!(outcome.track, "beta");
  assert_eq!(outcome.user_fraction, None);
  assert!(
    outcome
      .notes
      .iter()
      .any(|n| n == "Ignoring staged rollout percentage as it only applies to production releases")
  );
  Ok(())
}

#[test]
fn test_cancelled_upload_never_commits() -> Result<()> {
  let mut workspace = TestWorkspace::new()?;
  workspace.add_apk("app.apk", "com.example", 3)?;
  let task = upload_task(&workspace, &["app.apk"], ReleaseTrack::Beta, 100.0)?;

  let backend = InMemoryBackend::new();
  let cancel = CancelToken::new();
  cancel.cancel();
  let err = run_upload(&backend, &task, &cancel, &mut TaskReport::new()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Interrupted);
  assert_eq!(backend.call_count(Operation::Commit), 0);
  Ok(())
}
