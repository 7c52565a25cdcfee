//! Upload command

use crate::artifact::locate::find_files;
use crate::artifact::obb::group_expansion_files;
use crate::commands::{load_config, percentage_flag, print_outcome, task_report};
use crate::core::cancel::CancelToken;
use crate::core::config::RecentChangesConfig;
use crate::core::credentials::{CredentialProvider, TokenCredentials};
use crate::core::error::{ConfigError, PublishError, PublishResult};
use crate::core::task::{self, UploadTask};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Flags for `playtrack upload`; every one overrides `[upload]`
#[derive(Debug, Clone, Default)]
pub struct UploadArgs {
  pub apk: Option<String>,
  pub track: Option<String>,
  pub rollout: Option<String>,
  pub expansion_files: Option<String>,
  pub use_previous_expansion_files: bool,
  /// `LANGUAGE=TEXT`
  pub recent_changes: Vec<String>,
  pub config: Option<PathBuf>,
  pub json: bool,
}

/// Parse `LANGUAGE=TEXT` flags
pub fn parse_recent_changes(values: &[String]) -> PublishResult<Vec<RecentChangesConfig>> {
  let mut parsed = Vec::new();
  let mut errors = Vec::new();
  for value in values {
    match value.split_once('=') {
      Some((language, text)) => parsed.push(RecentChangesConfig {
        language: language.trim().to_string(),
        text: text.to_string(),
      }),
      None => errors.push(format!("Recent changes must be given as LANGUAGE=TEXT, got '{}'", value)),
    }
  }
  if errors.is_empty() {
    Ok(parsed)
  } else {
    Err(PublishError::Config(ConfigError::Invalid { errors }))
  }
}

/// Run the upload command
pub fn run_upload(args: UploadArgs) -> PublishResult<()> {
  let loaded = load_config(args.config.as_deref())?;
  let mut upload = loaded.config.upload.clone();
  if args.apk.is_some() {
    upload.artifacts = args.apk;
  }
  if args.track.is_some() {
    upload.track = args.track;
  }
  if let Some(rollout) = percentage_flag(args.rollout) {
    upload.rollout_percentage = Some(rollout);
  }
  if args.expansion_files.is_some() {
    upload.expansion_files = args.expansion_files;
  }
  upload.use_previous_expansion_files |= args.use_previous_expansion_files;
  if !args.recent_changes.is_empty() {
    upload.recent_changes = parse_recent_changes(&args.recent_changes)?;
  }

  let settings = upload.resolve()?;
  let artifacts = loaded.artifacts(&settings.artifacts, !args.json)?;

  let expansion_files = match &settings.expansion_files {
    Some(pattern) => {
      let files = find_files(&loaded.base_dir, pattern)?;
      group_expansion_files(&loaded.base_dir, &files)?
    }
    None => BTreeMap::new(),
  };

  let credentials = TokenCredentials::from_config(&loaded.config.credentials, &loaded.config.api, &loaded.base_dir);
  let api = credentials.authorize()?;

  let task = UploadTask {
    credential_name: credentials.name().to_string(),
    artifacts,
    track: settings.track,
    rollout: settings.rollout,
    expansion_files,
    inherit_expansion_files: settings.inherit_expansion_files,
    recent_changes: settings.recent_changes,
  };

  let mut report = task_report(args.json);
  let outcome = task::run_upload(api.as_ref(), &task, &CancelToken::new(), &mut report)?;
  print_outcome(&outcome, args.json)
}
