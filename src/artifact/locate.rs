//! Locating files by glob pattern

use crate::core::error::{PublishError, PublishResult};
use crate::utils::display_path;
use std::collections::BTreeSet;
use std::path::Path;

/// Find files under `base_dir` matching a comma-separated list of glob patterns
///
/// Returns paths relative to `base_dir` (forward slashes, sorted, no
/// duplicates). A missing base directory yields an empty list; a directory
/// that cannot be read is an error.
pub fn find_files(base_dir: &Path, patterns: &str) -> PublishResult<Vec<String>> {
  if !base_dir.is_dir() {
    return Ok(Vec::new());
  }

  let escaped_base = glob::Pattern::escape(&base_dir.to_string_lossy());
  let mut found = BTreeSet::new();

  for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
    let full = if Path::new(pattern).is_absolute() {
      pattern.to_string()
    } else {
      format!("{}/{}", escaped_base, pattern)
    };

    for entry in glob::glob(&full)? {
      let entry = entry.map_err(|err| {
        PublishError::with_help(
          format!("Failed to read {} while matching '{}': {}", err.path().display(), pattern, err.error()),
          "Check the permissions of the directories the pattern walks through",
        )
      })?;
      if !entry.is_file() {
        continue;
      }
      let relative = entry.strip_prefix(base_dir).unwrap_or(&entry);
      found.insert(display_path(relative));
    }
  }

  Ok(found.into_iter().collect())
}
