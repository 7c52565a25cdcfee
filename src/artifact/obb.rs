//! Expansion file discovery by file name
//!
//! Google Play names expansion files `main.<versionCode>.<package>.obb` and
//! `patch.<versionCode>.<package>.obb`; files following that rule are grouped
//! per version code.

use crate::core::api::ExpansionFileType;
use crate::core::error::{PublishError, PublishResult};
use crate::core::expansion::ExpansionFileSet;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

static OBB_FILE_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^(main|patch)\.([0-9]+)\.([._a-z0-9]+)\.obb$").expect("valid obb regex"));

/// Type and version code encoded in an expansion file name
pub fn parse_file_name(file_name: &str) -> Option<(ExpansionFileType, u32)> {
  let caps = OBB_FILE_NAME.captures(file_name)?;
  let file_type = if caps[1].eq_ignore_ascii_case("main") {
    ExpansionFileType::Main
  } else {
    ExpansionFileType::Patch
  };
  let version_code = caps[2].parse().ok()?;
  Some((file_type, version_code))
}

/// Group files (relative to `base_dir`) into one set per version code
///
/// Files that do not follow the naming rule are skipped with a warning. Two
/// files for the same slot are an error.
pub fn group_expansion_files(base_dir: &Path, relative_paths: &[String]) -> PublishResult<BTreeMap<u32, ExpansionFileSet>> {
  let mut sets: BTreeMap<u32, ExpansionFileSet> = BTreeMap::new();

  for relative in relative_paths {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    let Some((file_type, version_code)) = parse_file_name(file_name) else {
      warn!(file = %relative, "skipping file that is not named like an expansion file");
      continue;
    };

    let set = sets.entry(version_code).or_default();
    if set.get(file_type).is_some() {
      return Err(PublishError::with_help(
        format!(
          "Multiple {} expansion files were found for versionCode {}",
          file_type, version_code
        ),
        "Narrow the expansion file pattern so each version has at most one main and one patch file",
      ));
    }
    set.set(file_type, base_dir.join(relative));
  }

  Ok(sets)
}
