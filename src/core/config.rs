use crate::core::error::{ConfigError, PublishError, PublishResult, ResultExt};
use crate::core::track::{
  DEFAULT_PERCENTAGE, ReleaseTrack, RolloutFraction, format_percentage, is_valid_rollout_percentage, parse_percentage,
};
use crate::utils::{expand_variables_with, parse_version_codes};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Longest "recent changes" text Google Play accepts
pub const MAX_RECENT_CHANGES_CHARS: usize = 500;

static LANGUAGE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[a-z]{2,3}([-_][0-9A-Z]{2,})?$").expect("valid language regex"));

/// Configuration for playtrack
/// Searched in order: playtrack.toml, .playtrack.toml, .config/playtrack.toml
///
/// ```toml
/// [credentials]
/// name = "release-bot"
/// token_env = "PLAYTRACK_ACCESS_TOKEN"
///
/// [upload]
/// artifacts = "app/build/outputs/apk/**/*-release.apk"
/// track = "production"
/// rollout_percentage = 10
///
/// [[upload.recent_changes]]
/// language = "en-US"
/// text = "Bug fixes"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub credentials: CredentialsConfig,
  #[serde(default)]
  pub tools: ToolsConfig,
  #[serde(default)]
  pub upload: UploadConfig,
  #[serde(default)]
  pub assign: AssignConfig,
}

/// Google Play Developer API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default = "default_upload_url")]
  pub upload_url: String,
  /// Per-request timeout; a commit that exceeds it is reconciled
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_base_url() -> String {
  "https://www.googleapis.com/androidpublisher/v2/applications".to_string()
}

fn default_upload_url() -> String {
  "https://www.googleapis.com/upload/androidpublisher/v2/applications".to_string()
}

fn default_timeout_secs() -> u64 {
  120
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      upload_url: default_upload_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

/// Where the OAuth access token comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
  /// Label shown in logs (default: the token source)
  #[serde(default)]
  pub name: Option<String>,
  /// Environment variable holding the token
  #[serde(default = "default_token_env")]
  pub token_env: String,
  /// File holding the token, used when the variable is unset
  #[serde(default)]
  pub token_file: Option<PathBuf>,
}

fn default_token_env() -> String {
  "PLAYTRACK_ACCESS_TOKEN".to_string()
}

impl Default for CredentialsConfig {
  fn default() -> Self {
    Self {
      name: None,
      token_env: default_token_env(),
      token_file: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
  /// `aapt` binary used to read APK metadata
  #[serde(default = "default_aapt")]
  pub aapt: String,
}

fn default_aapt() -> String {
  "aapt".to_string()
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self { aapt: default_aapt() }
  }
}

/// A percentage written as a number (`10`) or a string (`"0.5%"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PercentageValue {
  Number(f64),
  Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
  /// Comma-separated glob patterns for APK files
  #[serde(default)]
  pub artifacts: Option<String>,
  #[serde(default)]
  pub track: Option<String>,
  #[serde(default)]
  pub rollout_percentage: Option<PercentageValue>,
  /// Comma-separated glob patterns for `main|patch.<versionCode>.<package>.obb` files
  #[serde(default)]
  pub expansion_files: Option<String>,
  #[serde(default)]
  pub use_previous_expansion_files: bool,
  #[serde(default)]
  pub recent_changes: Vec<RecentChangesConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentChangesConfig {
  pub language: String,
  pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignConfig {
  #[serde(default)]
  pub application_id: Option<String>,
  /// Comma or whitespace separated
  #[serde(default)]
  pub version_codes: Option<String>,
  /// Read application id and version codes from these APK files instead
  #[serde(default)]
  pub artifacts: Option<String>,
  #[serde(default)]
  pub track: Option<String>,
  #[serde(default)]
  pub rollout_percentage: Option<PercentageValue>,
}

/// Validated upload settings
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
  pub artifacts: String,
  pub track: ReleaseTrack,
  pub rollout: RolloutFraction,
  pub expansion_files: Option<String>,
  pub inherit_expansion_files: bool,
  pub recent_changes: Vec<RecentChangesConfig>,
}

/// Where an assignment's version codes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignSource {
  VersionCodes {
    application_id: String,
    version_codes: BTreeSet<u32>,
  },
  Artifacts(String),
}

/// Validated assignment settings
#[derive(Debug, Clone, PartialEq)]
pub struct AssignSettings {
  pub source: AssignSource,
  pub track: ReleaseTrack,
  pub rollout: RolloutFraction,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate a track and its rollout percentage, collecting errors
fn resolve_track(
  track: Option<&str>,
  percentage: Option<&PercentageValue>,
  expand: &dyn Fn(&str) -> String,
  errors: &mut Vec<String>,
) -> Option<(ReleaseTrack, RolloutFraction)> {
  let percentage = match percentage {
    Some(PercentageValue::Number(n)) => *n,
    Some(PercentageValue::Text(text)) => parse_percentage(&expand(text)),
    None => DEFAULT_PERCENTAGE,
  };

  let Some(name) = non_blank(track).map(expand) else {
    errors.push("Release track was not specified".to_string());
    return None;
  };
  let Some(track) = ReleaseTrack::from_config(&name) else {
    errors.push(format!("'{}' is not a valid release track", name.trim()));
    return None;
  };

  if track != ReleaseTrack::Production {
    return Some((track, RolloutFraction::from_percentage(percentage).unwrap_or_default()));
  }
  match RolloutFraction::from_percentage(percentage).filter(|_| is_valid_rollout_percentage(percentage)) {
    Some(rollout) => Some((track, rollout)),
    None => {
      errors.push(format!(
        "{}% is not a valid rollout percentage",
        format_percentage(percentage)
      ));
      None
    }
  }
}

impl UploadConfig {
  /// Validate against the process environment
  pub fn resolve(&self) -> PublishResult<UploadSettings> {
    self.resolve_with(|name| std::env::var(name).ok())
  }

  /// Validate, expanding `$VAR` references through `lookup`
  ///
  /// Every problem is reported at once.
  pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> PublishResult<UploadSettings> {
    let expand = |value: &str| expand_variables_with(value, &lookup);
    let mut errors = Vec::new();

    let artifacts = non_blank(self.artifacts.as_deref()).map(|p| expand(p));
    if artifacts.is_none() {
      errors.push("Path or pattern to APK file(s) was not specified".to_string());
    }
    let track = resolve_track(
      self.track.as_deref(),
      self.rollout_percentage.as_ref(),
      &expand,
      &mut errors,
    );

    let mut recent_changes = Vec::new();
    for entry in &self.recent_changes {
      let language = entry.language.trim();
      let text = expand(entry.text.trim());
      if !LANGUAGE.is_match(language) {
        errors.push(format!("'{}' is not a valid language code for recent changes", language));
        continue;
      }
      let length = text.chars().count();
      if length > MAX_RECENT_CHANGES_CHARS {
        errors.push(format!(
          "Recent changes text for '{}' must be at most {} characters (found {})",
          language, MAX_RECENT_CHANGES_CHARS, length
        ));
        continue;
      }
      if !text.is_empty() {
        recent_changes.push(RecentChangesConfig {
          language: language.to_string(),
          text,
        });
      }
    }

    match (artifacts, track) {
      (Some(artifacts), Some((track, rollout))) if errors.is_empty() => Ok(UploadSettings {
        artifacts,
        track,
        rollout,
        expansion_files: non_blank(self.expansion_files.as_deref()).map(|p| expand(p)),
        inherit_expansion_files: self.use_previous_expansion_files,
        recent_changes,
      }),
      _ => Err(PublishError::Config(ConfigError::Invalid { errors })),
    }
  }
}

impl AssignConfig {
  /// Validate against the process environment
  pub fn resolve(&self) -> PublishResult<AssignSettings> {
    self.resolve_with(|name| std::env::var(name).ok())
  }

  pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> PublishResult<AssignSettings> {
    let expand = |value: &str| expand_variables_with(value, &lookup);
    let mut errors = Vec::new();

    let source = match non_blank(self.artifacts.as_deref()) {
      Some(pattern) => Some(AssignSource::Artifacts(expand(pattern))),
      None => {
        let application_id = non_blank(self.application_id.as_deref()).map(|id| expand(id));
        if application_id.is_none() {
          errors.push("No application ID was specified".to_string());
        }
        let version_codes = non_blank(self.version_codes.as_deref())
          .map(|codes| parse_version_codes(&expand(codes)))
          .unwrap_or_default();
        if version_codes.is_empty() {
          errors.push("No version codes were specified".to_string());
        }
        application_id.map(|application_id| AssignSource::VersionCodes {
          application_id,
          version_codes,
        })
      }
    };
    let track = resolve_track(
      self.track.as_deref(),
      self.rollout_percentage.as_ref(),
      &expand,
      &mut errors,
    );

    match (source, track) {
      (Some(source), Some((track, rollout))) if errors.is_empty() => Ok(AssignSettings { source, track, rollout }),
      _ => Err(PublishError::Config(ConfigError::Invalid { errors })),
    }
  }
}

impl PublishConfig {
  /// Find config file in search order: playtrack.toml, .playtrack.toml, .config/playtrack.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("playtrack.toml"),
      path.join(".playtrack.toml"),
      path.join(".config").join("playtrack.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from playtrack.toml (searches multiple locations)
  pub fn load(path: &Path) -> PublishResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      PublishError::Config(ConfigError::NotFound {
        workspace_root: path.to_path_buf(),
      })
    })?;
    Self::load_file(&config_path)
  }

  /// Load config if one exists, defaults otherwise; flags can supply everything
  pub fn load_or_default(path: &Path) -> PublishResult<Self> {
    match Self::find_config_path(path) {
      Some(config_path) => Self::load_file(&config_path),
      None => Ok(Self::default()),
    }
  }

  /// Load an explicit config file
  pub fn load_file(config_path: &Path) -> PublishResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: PublishConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config.validate()?;
    Ok(config)
  }

  /// Check settings that do not depend on the command being run
  pub fn validate(&self) -> PublishResult<()> {
    let mut errors = Vec::new();
    if self.api.timeout_secs == 0 {
      errors.push("[api] timeout_secs must be greater than zero".to_string());
    }
    for (key, url) in [("base_url", &self.api.base_url), ("upload_url", &self.api.upload_url)] {
      if !url.starts_with("https://") && !url.starts_with("http://") {
        errors.push(format!("[api] {} must be an http(s) URL, got '{}'", key, url));
      }
    }
    if self.credentials.token_env.trim().is_empty() {
      errors.push("[credentials] token_env must not be empty".to_string());
    }
    if errors.is_empty() {
      Ok(())
    } else {
      Err(PublishError::Config(ConfigError::Invalid { errors }))
    }
  }
}
