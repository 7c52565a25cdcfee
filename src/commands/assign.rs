//! Assign command

use crate::artifact::single_application_id;
use crate::commands::{load_config, percentage_flag, print_outcome, task_report};
use crate::core::cancel::CancelToken;
use crate::core::config::AssignSource;
use crate::core::credentials::{CredentialProvider, TokenCredentials};
use crate::core::error::PublishResult;
use crate::core::task::{self, AssignmentTask};
use std::path::PathBuf;

/// Flags for `playtrack assign`; every one overrides `[assign]`
#[derive(Debug, Clone, Default)]
pub struct AssignArgs {
  pub application_id: Option<String>,
  pub version_codes: Option<String>,
  pub apk: Option<String>,
  pub track: Option<String>,
  pub rollout: Option<String>,
  pub dry_run: bool,
  pub config: Option<PathBuf>,
  pub json: bool,
}

/// Run the assign command
pub fn run_assign(args: AssignArgs) -> PublishResult<()> {
  let loaded = load_config(args.config.as_deref())?;
  let mut assign = loaded.config.assign.clone();
  if args.application_id.is_some() || args.version_codes.is_some() {
    // Explicit version codes win over APK files from the config
    assign.artifacts = None;
  }
  if args.application_id.is_some() {
    assign.application_id = args.application_id;
  }
  if args.version_codes.is_some() {
    assign.version_codes = args.version_codes;
  }
  if args.apk.is_some() {
    assign.artifacts = args.apk;
  }
  if args.track.is_some() {
    assign.track = args.track;
  }
  if let Some(rollout) = percentage_flag(args.rollout) {
    assign.rollout_percentage = Some(rollout);
  }

  let settings = assign.resolve()?;
  let (application_id, version_codes) = match settings.source {
    AssignSource::VersionCodes {
      application_id,
      version_codes,
    } => (application_id, version_codes),
    AssignSource::Artifacts(pattern) => {
      let artifacts = loaded.artifacts(&pattern, !args.json)?;
      let application_id = single_application_id(&artifacts)?;
      (application_id, artifacts.iter().map(|a| a.version_code).collect())
    }
  };

  let credentials = TokenCredentials::from_config(&loaded.config.credentials, &loaded.config.api, &loaded.base_dir);
  let api = credentials.authorize()?;

  let task = AssignmentTask {
    credential_name: credentials.name().to_string(),
    application_id,
    version_codes,
    track: settings.track,
    rollout: settings.rollout,
    dry_run: args.dry_run,
  };

  let mut report = task_report(args.json);
  let outcome = task::run_assignment(api.as_ref(), &task, &CancelToken::new(), &mut report)?;
  print_outcome(&outcome, args.json)
}
