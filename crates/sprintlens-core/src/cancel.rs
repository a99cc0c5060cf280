//! Cooperative cancellation shared between a run and its owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::MetricsError;

/// Cloneable cancellation flag.
///
/// Long loops call [`CancelToken::check`] at their natural checkpoints and
/// unwind with [`MetricsError::Cancelled`]; nothing is interrupted
/// preemptively.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// # Errors
    ///
    /// Returns [`MetricsError::Cancelled`] once the token has been cancelled.
    pub fn check(&self) -> Result<(), MetricsError> {
        if self.is_cancelled() {
            Err(MetricsError::Cancelled)
        } else {
            Ok(())
        }
    }
}
