//! Error types for playtrack with contextual messages and exit codes
//!
//! Every failure that reaches the task boundary is a [`PublishError`]. Each
//! variant maps to a stable [`ErrorKind`] for machine-readable reporting, an
//! [`ExitCode`] for the process, and (where useful) a help message.
//!
//! Remote failures are classified by [`classify_api_error`], which is the only
//! place that decides how a transport or HTTP failure is presented.

use crate::core::api::ApiError;
use crate::core::track::format_fraction;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for playtrack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, credentials, unreadable artifacts)
  User = 1,
  /// System error (network, remote API, I/O)
  System = 2,
  /// Policy violation detected locally (duplicates, rollout reduction, ...)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Stable classification of a failure, used for JSON output and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Credentials,
  Config,
  Auth,
  Remote,
  DuplicateArtifact,
  Consistency,
  RolloutPercentageReduction,
  MissingMainExpansionFile,
  UnknownVersionCodes,
  InvalidArtifact,
  CommitTimeout,
  PartialAssignment,
  Interrupted,
  Io,
  Other,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::Credentials => "credentials",
      ErrorKind::Config => "config",
      ErrorKind::Auth => "auth",
      ErrorKind::Remote => "remote",
      ErrorKind::DuplicateArtifact => "duplicate_artifact",
      ErrorKind::Consistency => "consistency",
      ErrorKind::RolloutPercentageReduction => "rollout_percentage_reduction",
      ErrorKind::MissingMainExpansionFile => "missing_main_expansion_file",
      ErrorKind::UnknownVersionCodes => "unknown_version_codes",
      ErrorKind::InvalidArtifact => "invalid_artifact",
      ErrorKind::CommitTimeout => "commit_timeout",
      ErrorKind::PartialAssignment => "partial_assignment",
      ErrorKind::Interrupted => "interrupted",
      ErrorKind::Io => "io",
      ErrorKind::Other => "other",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What is known about an edit whose commit acknowledgment never arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResolution {
  /// Reconciliation has not run yet
  Pending,
  /// A fresh edit showed the changes were not applied
  NotApplied,
  /// Reconciliation could not decide; the outcome is unknown
  Unresolved { reason: String },
}

/// Main error type for playtrack
#[derive(Debug)]
pub enum PublishError {
  /// Local credential configuration problem; never retried
  Credentials { message: String },

  /// Configuration errors
  Config(ConfigError),

  /// The remote API rejected the credential at call time
  Auth { details: Option<String> },

  /// Any other remote failure
  Remote { status: Option<u16>, details: Option<String> },

  /// An artifact with the same content hash already exists remotely
  DuplicateArtifact {
    file: String,
    version_code: u32,
    sha1: String,
  },

  /// The backend assigned a different version code than the one parsed locally
  Consistency { file: String, expected: u32, actual: u32 },

  /// A rollout would be lowered while the caller asked for rejection
  RolloutPercentageReduction { current: f64, requested: f64 },

  /// Patch expansion files were given without a main file to accompany them
  MissingMainExpansionFile { version_codes: Vec<u32> },

  /// Direct assignment named version codes the application does not have
  UnknownVersionCodes { track: String, missing: Vec<u32> },

  /// A local file could not be read as an artifact
  InvalidArtifact { path: PathBuf, reason: String },

  /// The commit request timed out without an HTTP status
  CommitTimeout {
    expected: Vec<u32>,
    resolution: CommitResolution,
  },

  /// Some track updates were applied inside the edit before a failure
  PartialAssignment {
    completed: Vec<String>,
    source: Box<PublishError>,
  },

  /// The task was cancelled before the next remote call
  Interrupted,

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PublishError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PublishError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PublishError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Create a local credentials error
  pub fn credentials(msg: impl Into<String>) -> Self {
    PublishError::Credentials { message: msg.into() }
  }

  /// Add context to an existing error
  ///
  /// Classified errors keep their variant; only free-form and I/O errors
  /// absorb the context.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PublishError::Message { message, context, help } => PublishError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PublishError::Io(err) => PublishError::Message {
        message: ctx_str,
        context: Some(err.to_string()),
        help: None,
      },
      _ => self,
    }
  }

  /// Stable classification of this error
  pub fn kind(&self) -> ErrorKind {
    match self {
      PublishError::Credentials { .. } => ErrorKind::Credentials,
      PublishError::Config(_) => ErrorKind::Config,
      PublishError::Auth { .. } => ErrorKind::Auth,
      PublishError::Remote { .. } => ErrorKind::Remote,
      PublishError::DuplicateArtifact { .. } => ErrorKind::DuplicateArtifact,
      PublishError::Consistency { .. } => ErrorKind::Consistency,
      PublishError::RolloutPercentageReduction { .. } => ErrorKind::RolloutPercentageReduction,
      PublishError::MissingMainExpansionFile { .. } => ErrorKind::MissingMainExpansionFile,
      PublishError::UnknownVersionCodes { .. } => ErrorKind::UnknownVersionCodes,
      PublishError::InvalidArtifact { .. } => ErrorKind::InvalidArtifact,
      PublishError::CommitTimeout { .. } => ErrorKind::CommitTimeout,
      PublishError::PartialAssignment { .. } => ErrorKind::PartialAssignment,
      PublishError::Interrupted => ErrorKind::Interrupted,
      PublishError::Io(_) => ErrorKind::Io,
      PublishError::Message { .. } => ErrorKind::Other,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PublishError::Credentials { .. }
      | PublishError::Config(_)
      | PublishError::InvalidArtifact { .. }
      | PublishError::Message { .. } => ExitCode::User,
      PublishError::DuplicateArtifact { .. }
      | PublishError::Consistency { .. }
      | PublishError::RolloutPercentageReduction { .. }
      | PublishError::MissingMainExpansionFile { .. }
      | PublishError::UnknownVersionCodes { .. } => ExitCode::Validation,
      PublishError::Auth { .. }
      | PublishError::Remote { .. }
      | PublishError::CommitTimeout { .. }
      | PublishError::PartialAssignment { .. }
      | PublishError::Interrupted
      | PublishError::Io(_) => ExitCode::System,
    }
  }

  /// Whether the Google Play account is known to be untouched by the failed task
  ///
  /// Everything before a commit lives in an uncommitted edit, so only a commit
  /// whose outcome could not be established leaves the remote state in doubt.
  pub fn remote_state_unchanged(&self) -> bool {
    match self {
      PublishError::CommitTimeout { resolution, .. } => *resolution == CommitResolution::NotApplied,
      _ => true,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PublishError::Config(e) => e.help_message(),
      PublishError::Credentials { .. } => Some(
        "Set the access token environment variable named in [credentials] token_env, or point token_file at a file containing the token.".to_string(),
      ),
      PublishError::Auth { .. } => {
        Some("Refresh the access token and check that the service account has release permissions.".to_string())
      }
      PublishError::DuplicateArtifact { .. } => {
        Some("Increase the versionCode and rebuild; Google Play never accepts the same APK twice.".to_string())
      }
      PublishError::Consistency { .. } => Some(
        "The local APK metadata disagrees with Google Play. Check that the aapt tool matches your build tools version."
          .to_string(),
      ),
      PublishError::RolloutPercentageReduction { .. } => {
        Some("Choose a rollout percentage at or above the current one, or halt the rollout in the Play Console.".to_string())
      }
      PublishError::MissingMainExpansionFile { .. } => Some(
        "Provide a main expansion file for each version, or enable use_previous_expansion_files.".to_string(),
      ),
      PublishError::UnknownVersionCodes { .. } => {
        Some("Only APKs that were already uploaded can be moved between tracks.".to_string())
      }
      PublishError::CommitTimeout { resolution, .. } => match resolution {
        CommitResolution::NotApplied => Some("It is safe to run the task again.".to_string()),
        _ => Some("Check the Play Console to see whether the changes were applied before running again.".to_string()),
      },
      PublishError::PartialAssignment { .. } => Some(
        "The edit was not committed, so Google Play is unchanged; inspect the tracks before retrying.".to_string(),
      ),
      PublishError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for PublishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PublishError::Credentials { message } => write!(f, "{}", message),
      PublishError::Config(e) => write!(f, "{}", e),
      PublishError::Auth { details } => match details {
        Some(details) => write!(f, "Google Play rejected the credentials: {}", details),
        None => write!(f, "Google Play rejected the credentials"),
      },
      PublishError::Remote { status, details } => {
        write!(f, "Google Play API request failed")?;
        if let Some(status) = status {
          write!(f, " (HTTP {})", status)?;
        }
        if let Some(details) = details {
          write!(f, ": {}", details)?;
        }
        Ok(())
      }
      PublishError::DuplicateArtifact {
        file,
        version_code,
        sha1,
      } => write!(
        f,
        "{} (versionCode {}, SHA-1 {}) already exists in the Google Play account; it cannot be uploaded again",
        file, version_code, sha1
      ),
      PublishError::Consistency { file, expected, actual } => write!(
        f,
        "Google Play registered {} as versionCode {}, but the file declares versionCode {}",
        file, actual, expected
      ),
      PublishError::RolloutPercentageReduction { current, requested } => write!(
        f,
        "Staged rollout percentage cannot be reduced from {}% to the configured {}%",
        format_fraction(*current),
        format_fraction(*requested)
      ),
      PublishError::MissingMainExpansionFile { version_codes } => write!(
        f,
        "A patch expansion file was given without a main expansion file for versionCode(s): {}",
        join_codes(version_codes)
      ),
      PublishError::UnknownVersionCodes { track, missing } => write!(
        f,
        "Could not assign APK(s) to {}, as these APKs do not exist: {}",
        track,
        join_codes(missing)
      ),
      PublishError::InvalidArtifact { path, reason } => {
        write!(f, "File does not appear to be a valid APK: {}\n- {}", path.display(), reason)
      }
      PublishError::CommitTimeout { expected, resolution } => {
        write!(f, "Applying changes timed out")?;
        match resolution {
          CommitResolution::Pending => write!(f, "; the outcome has not been checked yet"),
          CommitResolution::NotApplied => write!(
            f,
            "; APK(s) {} were not found on Google Play afterwards",
            join_codes(expected)
          ),
          CommitResolution::Unresolved { reason } => write!(
            f,
            "; checking whether APK(s) {} were applied also failed: {}",
            join_codes(expected),
            reason
          ),
        }
      }
      PublishError::PartialAssignment { completed, source } => {
        write!(f, "{}", source)?;
        write!(f, "\nTrack updates already made in the uncommitted edit:")?;
        for step in completed {
          write!(f, "\n- {}", step)?;
        }
        Ok(())
      }
      PublishError::Interrupted => write!(f, "Interrupted before the next Google Play request"),
      PublishError::Io(e) => write!(f, "I/O error: {}", e),
      PublishError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PublishError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PublishError::Io(e) => Some(e),
      PublishError::PartialAssignment { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for PublishError {
  fn from(err: io::Error) -> Self {
    PublishError::Io(err)
  }
}

impl From<String> for PublishError {
  fn from(msg: String) -> Self {
    PublishError::message(msg)
  }
}

impl From<&str> for PublishError {
  fn from(msg: &str) -> Self {
    PublishError::message(msg)
  }
}

impl From<ConfigError> for PublishError {
  fn from(err: ConfigError) -> Self {
    PublishError::Config(err)
  }
}

impl From<ApiError> for PublishError {
  fn from(err: ApiError) -> Self {
    classify_api_error(err)
  }
}

impl From<toml_edit::de::Error> for PublishError {
  fn from(err: toml_edit::de::Error) -> Self {
    PublishError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for PublishError {
  fn from(err: serde_json::Error) -> Self {
    PublishError::message(format!("JSON error: {}", err))
  }
}

impl From<glob::PatternError> for PublishError {
  fn from(err: glob::PatternError) -> Self {
    PublishError::message(format!("Invalid file pattern: {}", err))
  }
}

impl From<std::env::VarError> for PublishError {
  fn from(err: std::env::VarError) -> Self {
    PublishError::message(format!("Environment variable error: {}", err))
  }
}

/// Classify a remote failure into the stable taxonomy
///
/// A 401 never carries details from Google, so a fixed explanation is used.
/// Timeouts outside of commit are ordinary remote failures; the commit path
/// handles its own timeout before reaching here.
pub fn classify_api_error(err: ApiError) -> PublishError {
  match err {
    ApiError::Status { code: 401, message } => PublishError::Auth {
      details: Some(
        message.unwrap_or_else(|| "The API credentials provided do not have permission to apply these changes".into()),
      ),
    },
    ApiError::Status { code, message } => PublishError::Remote {
      status: Some(code),
      details: message,
    },
    ApiError::Timeout => PublishError::Remote {
      status: None,
      details: Some("The request timed out before Google Play responded".to_string()),
    },
    ApiError::Transport(reason) => PublishError::Remote {
      status: None,
      details: Some(reason),
    },
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// playtrack.toml not found
  NotFound { workspace_root: PathBuf },

  /// One or more settings failed validation
  Invalid { errors: Vec<String> },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create playtrack.toml, or pass the required values as command-line flags.".to_string())
      }
      ConfigError::Invalid { .. } => Some("Fix the settings listed above and run again.".to_string()),
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { workspace_root } => {
        write!(
          f,
          "No playtrack configuration found.\nExpected file: {}/playtrack.toml",
          workspace_root.display()
        )
      }
      ConfigError::Invalid { errors } => {
        write!(f, "Cannot make changes to Google Play:")?;
        for error in errors {
          write!(f, "\n- {}", error)?;
        }
        Ok(())
      }
    }
  }
}

fn join_codes(codes: &[u32]) -> String {
  codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}

/// Result type alias for playtrack
pub type PublishResult<T> = Result<T, PublishError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PublishResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PublishResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PublishError>,
{
  fn context(self, ctx: impl Into<String>) -> PublishResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PublishResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text and the state of the account
pub fn print_error(error: &PublishError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }

  eprintln!("- No further changes will be attempted");
  if error.remote_state_unchanged() {
    eprintln!("- No changes have been applied to the Google Play account");
  }
}
