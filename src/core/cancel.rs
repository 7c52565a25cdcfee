//! Cooperative cancellation for blocking tasks

use crate::core::error::{PublishError, PublishResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag checked before every remote call
///
/// Clones observe the same flag, so a caller can hand one clone to the task
/// and keep another to cancel from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  cancelled: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  /// `Err(Interrupted)` once cancelled
  pub fn check(&self) -> PublishResult<()> {
    if self.is_cancelled() {
      Err(PublishError::Interrupted)
    } else {
      Ok(())
    }
  }
}
