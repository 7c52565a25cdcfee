//! Release tracks and staged-rollout fractions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rollout percentages Google Play accepts for a staged production release
pub const ROLLOUT_PERCENTAGES: [f64; 7] = [0.5, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0];

/// Percentage used when none is configured or the value cannot be parsed
pub const DEFAULT_PERCENTAGE: f64 = 100.0;

/// A named release lane on Google Play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseTrack {
  Alpha,
  Beta,
  Production,
  /// Hidden lane holding a production release that is only partially rolled out
  Rollout,
}

impl ReleaseTrack {
  /// Tracks that may be named in configuration, in promotion order
  pub const CONFIGURABLE: [ReleaseTrack; 3] = [ReleaseTrack::Alpha, ReleaseTrack::Beta, ReleaseTrack::Production];

  /// Name used by the Google Play API
  pub fn api_value(self) -> &'static str {
    match self {
      ReleaseTrack::Alpha => "alpha",
      ReleaseTrack::Beta => "beta",
      ReleaseTrack::Production => "production",
      ReleaseTrack::Rollout => "rollout",
    }
  }

  /// Parse a track named in configuration
  ///
  /// `rollout` is never accepted here: a staged rollout is requested by
  /// targeting production with a percentage below 100.
  pub fn from_config(value: &str) -> Option<Self> {
    let value = value.trim();
    Self::CONFIGURABLE
      .into_iter()
      .find(|track| track.api_value().eq_ignore_ascii_case(value))
  }
}

impl fmt::Display for ReleaseTrack {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.api_value())
  }
}

/// Share of users receiving a release, in `(0, 1]`
///
/// `1.0` is a full release. Anything lower on production is a staged rollout.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RolloutFraction(f64);

impl RolloutFraction {
  pub const FULL: RolloutFraction = RolloutFraction(1.0);

  /// Build from a fraction; `None` outside `(0, 1]`
  pub fn new(fraction: f64) -> Option<Self> {
    (fraction > 0.0 && fraction <= 1.0).then_some(Self(fraction))
  }

  /// Build from a percentage, e.g. `10.0` becomes `0.1`
  pub fn from_percentage(percentage: f64) -> Option<Self> {
    Self::new(percentage / 100.0)
  }

  pub fn value(self) -> f64 {
    self.0
  }

  pub fn is_full(self) -> bool {
    self.0 >= 1.0
  }
}

impl Default for RolloutFraction {
  fn default() -> Self {
    Self::FULL
  }
}

impl fmt::Display for RolloutFraction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}%", format_fraction(self.0))
  }
}

/// Parse a configured percentage such as `"10"`, `"0.5%"` or `" 20 % "`
///
/// Blank or unparsable values fall back to 100.
pub fn parse_percentage(value: &str) -> f64 {
  let trimmed = value.trim().trim_end_matches('%').trim();
  trimmed.parse::<f64>().unwrap_or(DEFAULT_PERCENTAGE)
}

/// Whether Google Play accepts this percentage for a staged rollout
pub fn is_valid_rollout_percentage(percentage: f64) -> bool {
  ROLLOUT_PERCENTAGES
    .iter()
    .any(|allowed| (allowed - percentage).abs() < 1e-9)
}

/// Format a percentage with at most one decimal place, dropping a trailing `.0`
pub fn format_percentage(percentage: f64) -> String {
  let rounded = (percentage * 10.0).round() / 10.0;
  if rounded.fract() == 0.0 {
    format!("{:.0}", rounded)
  } else {
    format!("{:.1}", rounded)
  }
}

/// Format a fraction as a percentage, e.g. `0.005` as `0.5`
pub fn format_fraction(fraction: f64) -> String {
  format_percentage(fraction * 100.0)
}
