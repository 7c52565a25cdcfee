//! Turning configured credentials into an authorized API client

use crate::core::api::PublisherApi;
use crate::core::config::{ApiConfig, CredentialsConfig};
use crate::core::error::{PublishError, PublishResult};
use crate::core::http::HttpPublisher;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of an authorized [`PublisherApi`]
pub trait CredentialProvider {
  /// Label for logs; never the secret itself
  fn name(&self) -> &str;

  /// Fail early when the credential cannot possibly work
  fn validate(&self) -> PublishResult<()>;

  fn authorize(&self) -> PublishResult<Box<dyn PublisherApi>>;
}

/// OAuth access token from an environment variable or a file
pub struct TokenCredentials {
  name: String,
  token_env: String,
  token_file: Option<PathBuf>,
  api: ApiConfig,
  lookup: fn(&str) -> Option<String>,
}

fn env_lookup(name: &str) -> Option<String> {
  std::env::var(name).ok()
}

impl TokenCredentials {
  /// Relative token files are resolved against `base_dir`
  pub fn from_config(credentials: &CredentialsConfig, api: &ApiConfig, base_dir: &Path) -> Self {
    let token_file = credentials.token_file.as_ref().map(|f| base_dir.join(f));
    let name = credentials.name.clone().unwrap_or_else(|| match &token_file {
      Some(file) if std::env::var_os(&credentials.token_env).is_none() => file.display().to_string(),
      _ => format!("${}", credentials.token_env),
    });
    Self {
      name,
      token_env: credentials.token_env.clone(),
      token_file,
      api: api.clone(),
      lookup: env_lookup,
    }
  }

  /// Read the token, preferring the environment variable
  pub fn token(&self) -> PublishResult<String> {
    if let Some(token) = (self.lookup)(&self.token_env).map(|t| t.trim().to_string())
      && !token.is_empty()
    {
      return Ok(token);
    }

    if let Some(file) = &self.token_file {
      let token = fs::read_to_string(file)
        .map_err(|e| PublishError::credentials(format!("Failed to read token file {}: {}", file.display(), e)))?;
      let token = token.trim();
      if token.is_empty() {
        return Err(PublishError::credentials(format!("Token file {} is empty", file.display())));
      }
      return Ok(token.to_string());
    }

    Err(PublishError::credentials(format!(
      "No Google Play access token found: ${} is not set and no token_file is configured",
      self.token_env
    )))
  }
}

impl CredentialProvider for TokenCredentials {
  fn name(&self) -> &str {
    &self.name
  }

  fn validate(&self) -> PublishResult<()> {
    self.token().map(|_| ())
  }

  fn authorize(&self) -> PublishResult<Box<dyn PublisherApi>> {
    let token = self.token()?;
    Ok(Box::new(HttpPublisher::new(&self.api, token)?))
  }
}
