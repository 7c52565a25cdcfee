//! Content-addressed identifiers for reviewable plans
//!
//! A dry run prints a plan together with its id. Identical inputs against
//! identical remote state produce the same id, so a reviewer can confirm that
//! the plan that was approved is the one being applied.

use crate::core::error::PublishResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Plan identifier (SHA256 hash of plan contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
  /// Create a plan ID from plan contents
  pub fn from_contents(contents: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let result = hasher.finalize();
    Self(format!("{:x}", result))
  }

  /// Hash the JSON form of a serialisable plan
  pub fn of<T: Serialize>(plan: &T) -> PublishResult<Self> {
    let json = serde_json::to_vec(plan)?;
    Ok(Self::from_contents(&json))
  }

  /// Get the short ID (first 12 characters)
  pub fn short(&self) -> &str {
    &self.0[..12.min(self.0.len())]
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for PlanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short())
  }
}
