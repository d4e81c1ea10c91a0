//! Atomic model publication and fit cancellation.
//!
//! A [`SnapshotCell`] holds the currently active model behind an `Arc`.
//! Readers clone the `Arc` under a short read lock and then work on their own
//! reference, so a concurrent publish never exposes a half-built model and
//! never waits for in-flight scoring to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{RecommenderError, Result};

#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Option<Arc<T>>>,
}

impl<T> SnapshotCell<T> {
    /// A cell with nothing published yet
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(value))),
        }
    }

    /// The active snapshot, if any
    pub fn load(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a fully built snapshot and return the one it replaced
    pub fn publish(&self, value: T) -> Option<Arc<T>> {
        self.publish_arc(Arc::new(value))
    }

    pub fn publish_arc(&self, value: Arc<T>) -> Option<Arc<T>> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.replace(value)
    }

    pub fn is_empty(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shared cancellation flag for long-running fits.
///
/// Cloning shares the flag; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`RecommenderError::Cancelled`] once the flag is set
    pub fn check(&self, recommender: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(RecommenderError::Cancelled(recommender.to_string()))
        } else {
            Ok(())
        }
    }
}
