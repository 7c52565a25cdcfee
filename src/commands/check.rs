//! Check command for diagnosing configuration problems
//!
//! Resolves every configured section and the credential without touching
//! Google Play. With `--remote` it also opens an edit and abandons it, which
//! proves the credential can reach the application.

use crate::commands::load_config;
use crate::core::cancel::CancelToken;
use crate::core::credentials::{CredentialProvider, TokenCredentials};
use crate::core::edit::EditSession;
use crate::core::error::{PublishError, PublishResult};
use crate::utils::display_path;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
  pub remote: bool,
  /// Application to open an edit for; defaults to `[assign] application_id`
  pub application_id: Option<String>,
  pub config: Option<PathBuf>,
  pub json: bool,
}

/// Outcome of one check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
  pub check_name: String,
  pub passed: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
}

impl CheckResult {
  fn pass(name: &str, message: impl Into<String>) -> Self {
    Self {
      check_name: name.to_string(),
      passed: true,
      message: message.into(),
      suggestion: None,
    }
  }

  fn fail(name: &str, err: &PublishError) -> Self {
    Self {
      check_name: name.to_string(),
      passed: false,
      message: err.to_string(),
      suggestion: err.help_message(),
    }
  }
}

/// Run the check command
///
/// Fails when any check fails, after printing all of them.
pub fn run_check(args: CheckArgs) -> PublishResult<()> {
  let loaded = load_config(args.config.as_deref())?;
  let config = &loaded.config;
  let mut results = Vec::new();

  results.push(CheckResult::pass(
    "config",
    match &loaded.path {
      Some(path) => format!("Loaded {}", display_path(path)),
      None => "No playtrack.toml found; flags must supply every setting".to_string(),
    },
  ));

  let upload = &config.upload;
  if upload.artifacts.is_some() || upload.track.is_some() {
    results.push(match upload.resolve() {
      Ok(settings) => CheckResult::pass(
        "upload",
        format!("{} to the {} release track", settings.artifacts, settings.track),
      ),
      Err(err) => CheckResult::fail("upload", &err),
    });
  }

  let assign = &config.assign;
  if assign.application_id.is_some() || assign.artifacts.is_some() || assign.track.is_some() {
    results.push(match assign.resolve() {
      Ok(settings) => CheckResult::pass("assign", format!("Assigning to the {} release track", settings.track)),
      Err(err) => CheckResult::fail("assign", &err),
    });
  }

  let credentials = TokenCredentials::from_config(&config.credentials, &config.api, &loaded.base_dir);
  let credential_ok = match credentials.validate() {
    Ok(()) => {
      results.push(CheckResult::pass(
        "credentials",
        format!("Token available from {}", credentials.name()),
      ));
      true
    }
    Err(err) => {
      results.push(CheckResult::fail("credentials", &err));
      false
    }
  };

  if args.remote && credential_ok {
    let application_id = args.application_id.clone().or_else(|| assign.application_id.clone());
    results.push(match application_id {
      Some(application_id) => match open_and_abandon(&credentials, &application_id) {
        Ok(edit_id) => CheckResult::pass(
          "remote",
          format!("Opened edit {} for {} (abandoned)", edit_id, application_id),
        ),
        Err(err) => CheckResult::fail("remote", &err),
      },
      None => CheckResult::fail(
        "remote",
        &PublishError::with_help(
          "No application ID to check against",
          "Pass --application-id or set [assign] application_id",
        ),
      ),
    });
  }

  let failed = results.iter().filter(|r| !r.passed).count();

  if args.json {
    let output = serde_json::to_string_pretty(&results)
      .map_err(|e| PublishError::message(format!("Failed to serialize JSON: {}", e)))?;
    println!("{}", output);
  } else {
    for result in &results {
      let icon = if result.passed { "✅" } else { "❌" };
      println!("{} {}: {}", icon, result.check_name, result.message);
      if !result.passed
        && let Some(suggestion) = &result.suggestion
      {
        println!("   💡 Fix: {}", suggestion);
      }
    }
    println!();
    println!("Summary: {}/{} checks passed", results.len() - failed, results.len());
  }

  if failed > 0 {
    return Err(PublishError::message(format!("{} check(s) failed", failed)));
  }
  Ok(())
}

fn open_and_abandon(credentials: &TokenCredentials, application_id: &str) -> PublishResult<String> {
  let api = credentials.authorize()?;
  let session = EditSession::open(api.as_ref(), application_id, &CancelToken::new())?;
  Ok(session.edit_id().to_string())
}
