//! Tests for the playtrack binary: configuration failures and the check command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_upload_without_settings_lists_every_problem() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  let output = playtrack(&workspace.path, &["upload"], &[])?;
  assert_eq!(output.status.code(), Some(1));

  let stderr = stderr(&output);
  assert!(stderr.contains("❌ Cannot make changes to Google Play:"));
  assert!(stderr.contains("- Path or pattern to APK file(s) was not specified"));
  assert!(stderr.contains("- Release track was not specified"));
  assert!(stderr.contains("- No further changes will be attempted"));
  assert!(stderr.contains("- No changes have been applied to the Google Play account"));
  Ok(())
}

#[test]
fn test_rollout_is_not_a_configurable_track() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file(
    "playtrack.toml",
    r#"[upload]
artifacts = "*.apk"
track = "rollout"
"#,
  )?;

  let output = playtrack(&workspace.path, &["upload"], &[])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("'rollout' is not a valid release track"));
  Ok(())
}

#[test]
fn test_production_percentage_must_be_supported() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file(
    "playtrack.toml",
    r#"[upload]
artifacts = "*.apk"
track = "production"
rollout_percentage = "15%"

[[upload.recent_changes]]
language = "english"
text = "Bug fixes"
"#,
  )?;

  let output = playtrack(&workspace.path, &["upload"], &[])?;
  let stderr = stderr(&output);
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("15% is not a valid rollout percentage"));
  assert!(stderr.contains("'english' is not a valid language code for recent changes"));
  Ok(())
}

#[test]
fn test_flags_override_config() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file(
    "playtrack.toml",
    r#"[upload]
track = "gamma"
"#,
  )?;

  // A valid track flag replaces the bad one; only the missing APKs remain
  let output = playtrack(
    &workspace.path,
    &["upload", "--track", "beta", "--apk", "build/*.apk"],
    &[],
  )?;
  let stderr = stderr(&output);
  assert_eq!(output.status.code(), Some(1));
  assert!(!stderr.contains("gamma"));
  assert!(stderr.contains("No APK files matched 'build/*.apk'"));
  Ok(())
}

#[test]
fn test_assign_requires_application_and_versions() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  let output = playtrack(&workspace.path, &["assign", "--track", "beta"], &[])?;
  let stderr = stderr(&output);
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("- No application ID was specified"));
  assert!(stderr.contains("- No version codes were specified"));
  Ok(())
}

#[test]
fn test_assign_without_token_is_a_credentials_error() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  let output = playtrack(
    &workspace.path,
    &["assign", "--application-id", "com.example", "--version-codes", "4, 5", "--track", "alpha"],
    &[],
  )?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("$PLAYTRACK_ACCESS_TOKEN"));
  Ok(())
}

#[test]
fn test_malformed_config_is_reported() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file("playtrack.toml", "[upload\ntrack = ")?;

  let output = playtrack(&workspace.path, &["upload"], &[])?;
  assert!(!output.status.success());
  assert!(stderr(&output).contains("Failed to parse config"));
  Ok(())
}

#[test]
fn test_check_fails_without_token() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  let output = playtrack(&workspace.path, &["check"], &[])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stdout(&output).contains("❌ credentials"));
  Ok(())
}

#[test]
fn test_check_expands_variables() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file(
    ".config/playtrack.toml",
    r#"[upload]
artifacts = "${APK_DIR}/*.apk"
track = "$TRACK"
"#,
  )?;

  let output = run_playtrack(
    &workspace.path,
    &["check"],
    &[
      ("PLAYTRACK_ACCESS_TOKEN", "ya29.test"),
      ("APK_DIR", "out"),
      ("TRACK", "beta"),
    ],
  )?;
  let stdout = stdout(&output);
  assert!(stdout.contains("✅ upload: out/*.apk to the beta release track"));
  assert!(stdout.contains("✅ credentials"));
  Ok(())
}

#[test]
fn test_check_json_output() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file("token.txt", "ya29.from-file\n")?;
  workspace.write_file(
    "playtrack.toml",
    r#"[credentials]
name = "ci-bot"
token_file = "token.txt"
"#,
  )?;

  let output = run_playtrack(&workspace.path, &["check", "--json"], &[])?;
  let results: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let results = results.as_array().expect("array of checks");
  let credentials = results
    .iter()
    .find(|r| r["check_name"] == "credentials")
    .expect("credentials check");
  assert_eq!(credentials["passed"], true);
  assert!(credentials["message"].as_str().unwrap_or_default().contains("ci-bot"));
  Ok(())
}
