//! Content hashing of local artifacts

use crate::core::error::{PublishResult, ResultExt};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io;
use std::path::Path;

/// Lower-case hex SHA-1 of a file, the digest Google Play reports for APKs
pub fn content_hash(path: &Path) -> PublishResult<String> {
  let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
  let mut hasher = Sha1::new();
  io::copy(&mut file, &mut hasher).with_context(|| format!("Failed to read {}", path.display()))?;
  Ok(format!("{:x}", hasher.finalize()))
}
