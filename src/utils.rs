//! Small string and path helpers shared by config and commands

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_]+|\{[A-Za-z0-9_]+\}|\$)").expect("valid variable regex"));

static VERSION_CODE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid separator regex"));

/// Display form of a path (always forward slashes)
///
/// Paths are shown the same way on every platform so logs and JSON output
/// compare cleanly.
pub fn display_path(path: &Path) -> String {
  #[cfg(target_os = "windows")]
  {
    path.to_string_lossy().replace('\\', "/")
  }
  #[cfg(not(target_os = "windows"))]
  {
    path.to_string_lossy().to_string()
  }
}

/// Parse a list of version codes separated by commas and/or whitespace
///
/// Entries that are not positive integers are ignored.
pub fn parse_version_codes(value: &str) -> BTreeSet<u32> {
  VERSION_CODE_SEPARATOR
    .split(value.trim())
    .filter_map(|part| part.parse::<u32>().ok())
    .filter(|vc| *vc > 0)
    .collect()
}

/// Expand `$NAME`, `${NAME}` and `$$` using `lookup`
///
/// Unknown variables are left as written; `$$` becomes a literal `$`.
pub fn expand_variables_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
  VARIABLE
    .replace_all(value, |caps: &Captures| {
      let token = &caps[1];
      if token == "$" {
        return "$".to_string();
      }
      let name = token.trim_start_matches('{').trim_end_matches('}');
      lookup(name).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
