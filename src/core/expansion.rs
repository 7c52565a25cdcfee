//! Attaching expansion files to newly uploaded APKs
//!
//! For each new version and each slot (main, patch) the associator either
//! uploads the local file, inherits the newest earlier version's file, or
//! leaves the slot empty. Inheritance looks at the application's earlier
//! versions in descending order and stops at the first one that has a real
//! file or a reference to one. A reference is followed once, never further.

use crate::core::api::ExpansionFileType;
use crate::core::edit::EditSession;
use crate::core::error::{PublishError, PublishResult};
use crate::core::report::TaskReport;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Local expansion files for one version code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionFileSet {
  pub main: Option<PathBuf>,
  pub patch: Option<PathBuf>,
}

impl ExpansionFileSet {
  pub fn get(&self, file_type: ExpansionFileType) -> Option<&Path> {
    match file_type {
      ExpansionFileType::Main => self.main.as_deref(),
      ExpansionFileType::Patch => self.patch.as_deref(),
    }
  }

  pub fn set(&mut self, file_type: ExpansionFileType, path: PathBuf) {
    match file_type {
      ExpansionFileType::Main => self.main = Some(path),
      ExpansionFileType::Patch => self.patch = Some(path),
    }
  }
}

/// Where a slot's expansion file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ExpansionSource {
  Uploaded,
  Inherited { from: u32 },
  None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpansionAssociation {
  pub version_code: u32,
  pub file_type: ExpansionFileType,
  pub source: ExpansionSource,
}

/// Reject patch files that have no main file to go with them
///
/// Google Play requires a main file alongside any patch file. Without
/// inheritance the main file can only come from the batch itself.
pub fn validate_expansion_files(files: &BTreeMap<u32, ExpansionFileSet>, inherit_if_missing: bool) -> PublishResult<()> {
  if inherit_if_missing {
    return Ok(());
  }
  let orphans: Vec<u32> = files
    .iter()
    .filter(|(_, set)| set.patch.is_some() && set.main.is_none())
    .map(|(vc, _)| *vc)
    .collect();
  if orphans.is_empty() {
    Ok(())
  } else {
    Err(PublishError::MissingMainExpansionFile { version_codes: orphans })
  }
}

pub struct ExpansionFileAssociator<'s, 'a> {
  session: &'s EditSession<'a>,
  /// Versions that existed before this task, newest first
  prior_versions: Vec<u32>,
  inherit_if_missing: bool,
  latest: HashMap<ExpansionFileType, Option<u32>>,
}

impl<'s, 'a> ExpansionFileAssociator<'s, 'a> {
  pub fn new(session: &'s EditSession<'a>, existing_version_codes: &[u32], inherit_if_missing: bool) -> Self {
    let mut prior_versions = existing_version_codes.to_vec();
    prior_versions.sort_unstable_by(|a, b| b.cmp(a));
    prior_versions.dedup();
    Self {
      session,
      prior_versions,
      inherit_if_missing,
      latest: HashMap::new(),
    }
  }

  /// Attach expansion files to every version in `new_versions`
  pub fn associate(
    &mut self,
    new_versions: &BTreeSet<u32>,
    files: &BTreeMap<u32, ExpansionFileSet>,
    report: &mut TaskReport,
  ) -> PublishResult<Vec<ExpansionAssociation>> {
    validate_expansion_files(files, self.inherit_if_missing)?;

    let mut associations = Vec::new();
    for &version_code in new_versions {
      report.blank();
      report.line(format!("Handling expansion files for versionCode {}", version_code));
      let local = files.get(&version_code);

      for file_type in ExpansionFileType::ALL {
        let source = match local.and_then(|set| set.get(file_type)) {
          Some(path) => {
            report.line(format!("- Uploading new {} expansion file", file_type));
            self.session.upload_expansion_file(version_code, file_type, path)?;
            ExpansionSource::Uploaded
          }
          None if self.inherit_if_missing => match self.latest_with_file(file_type, new_versions)? {
            Some(from) => {
              report.line(format!("- Applying {} expansion file from previous APK: {}", file_type, from));
              self.session.reference_expansion_file(version_code, file_type, from)?;
              ExpansionSource::Inherited { from }
            }
            None => {
              report.note(format!(
                "- No {0} expansion file to apply, and no existing APK with a {0} expansion file was found",
                file_type
              ));
              ExpansionSource::None
            }
          },
          None => {
            report.line(format!("- No {} expansion file to apply", file_type));
            ExpansionSource::None
          }
        };
        associations.push(ExpansionAssociation {
          version_code,
          file_type,
          source,
        });
      }
    }
    Ok(associations)
  }

  /// Newest earlier version holding a real file of this type, cached per type
  fn latest_with_file(&mut self, file_type: ExpansionFileType, batch: &BTreeSet<u32>) -> PublishResult<Option<u32>> {
    if let Some(cached) = self.latest.get(&file_type) {
      return Ok(*cached);
    }

    let mut found = None;
    for &candidate in self.prior_versions.iter().filter(|vc| !batch.contains(vc)) {
      let Some(info) = self.session.expansion_file(candidate, file_type)? else {
        continue;
      };
      if info.file_size.unwrap_or(0) > 0 {
        found = Some(candidate);
        break;
      }
      if let Some(referenced) = info.references_version
        && referenced > 0
      {
        found = Some(referenced);
        break;
      }
    }

    self.latest.insert(file_type, found);
    Ok(found)
  }
}
