//! Single-slot operation lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{EngineError, Result};

/// Holds the name of the one operation allowed to run at a time.
///
/// Acquisition never waits: a second caller is rejected with
/// [`EngineError::Busy`] naming the operation in flight.
#[derive(Debug, Default)]
pub struct OperationLock {
    slot: Mutex<Option<&'static str>>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<&'static str>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_acquire(&self, operation: &'static str) -> Result<OperationGuard<'_>> {
        let mut slot = self.slot();
        if let Some(current) = *slot {
            debug!(operation, current, "Operation rejected, lock held");
            return Err(EngineError::Busy {
                operation: current.to_string(),
            });
        }
        *slot = Some(operation);
        debug!(operation, "Operation lock acquired");
        Ok(OperationGuard {
            lock: self,
            operation,
        })
    }

    /// Name of the operation in flight.
    pub fn current(&self) -> Option<&'static str> {
        *self.slot()
    }

    pub fn is_held(&self) -> bool {
        self.current().is_some()
    }
}

/// Releases the lock when dropped, including during unwinding.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    lock: &'a OperationLock,
    operation: &'static str,
}

impl OperationGuard<'_> {
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        *self.lock.slot() = None;
        debug!(operation = self.operation, "Operation lock released");
    }
}
