//! Top-level fault boundary.
//!
//! Wraps a unit of work (a render pass, a CLI command) and turns both
//! returned errors and panics into a recorded [`Fault`]. From there the user
//! picks a soft reload, which keeps the stored state, or a hard reset, which
//! wipes every key in local storage.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use crate::error::Result;
use crate::storage::KeyValueStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Remount from stored state
    SoftReload,
    /// Clear index, snapshots and preferences
    HardReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    pub panicked: bool,
}

#[derive(Debug, Default)]
pub struct RecoveryBoundary {
    fault: Option<Fault>,
}

impl RecoveryBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`. Errors and panics are caught and recorded; the value comes
    /// back only on success.
    pub fn guard<T>(&mut self, f: impl FnOnce() -> Result<T>) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                error!(error = %e, "operation failed");
                self.fault = Some(Fault {
                    message: e.to_string(),
                    panicked: false,
                });
                None
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%message, "operation panicked");
                self.fault = Some(Fault {
                    message,
                    panicked: true,
                });
                None
            }
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn is_tripped(&self) -> bool {
        self.fault.is_some()
    }

    /// Acknowledge the fault. A hard reset clears `storage` first; if that
    /// fails the fault stays recorded.
    pub fn recover(&mut self, action: RecoveryAction, storage: &mut dyn KeyValueStorage) -> Result<()> {
        if action == RecoveryAction::HardReset {
            warn!("hard reset: clearing local storage");
            storage.clear()?;
        }
        self.fault = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;
    use crate::projects::{INDEX_KEY, ProjectRegistry};
    use crate::storage::MemoryStorage;

    #[test]
    fn success_passes_through() {
        let mut boundary = RecoveryBoundary::new();
        assert_eq!(boundary.guard(|| Ok(7)), Some(7));
        assert!(!boundary.is_tripped());
    }

    #[test]
    fn error_is_recorded() {
        let mut boundary = RecoveryBoundary::new();
        let out: Option<()> = boundary.guard(|| Err(BoardError::format("bad snapshot")));
        assert!(out.is_none());
        let fault = boundary.fault().unwrap();
        assert!(!fault.panicked);
        assert!(fault.message.contains("bad snapshot"));
    }

    #[test]
    fn panic_is_caught() {
        let mut boundary = RecoveryBoundary::new();
        let out: Option<()> = boundary.guard(|| panic!("render blew up"));
        assert!(out.is_none());
        assert!(boundary.fault().unwrap().panicked);
        assert_eq!(boundary.fault().unwrap().message, "render blew up");
    }

    #[test]
    fn soft_reload_keeps_storage() {
        let mut storage = MemoryStorage::new();
        ProjectRegistry::load(&mut storage).unwrap();
        let mut boundary = RecoveryBoundary::new();
        boundary.guard::<()>(|| Err(BoardError::format("x")));
        boundary.recover(RecoveryAction::SoftReload, &mut storage).unwrap();
        assert!(!boundary.is_tripped());
        assert!(storage.get(INDEX_KEY).unwrap().is_some());
    }

    #[test]
    fn hard_reset_clears_storage() {
        let mut storage = MemoryStorage::new();
        ProjectRegistry::load(&mut storage).unwrap();
        let mut boundary = RecoveryBoundary::new();
        boundary.guard::<()>(|| Err(BoardError::format("x")));
        boundary.recover(RecoveryAction::HardReset, &mut storage).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }
}
