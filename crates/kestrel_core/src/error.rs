//! # Core Error Types
//!
//! All errors that can occur in the core utilities.

use thiserror::Error;

use crate::sync::{CallbackPhase, LockAccess};

/// Errors that can occur in the core utilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Attempted to pop from an empty heap.
    ///
    /// This is a precondition violation on the caller's side; the heap
    /// never returns a sentinel entry that could be silently misused.
    #[error("cannot pop from an empty heap")]
    EmptyHeap,

    /// A lock acquisition did not complete within its timeout.
    ///
    /// Callers must not proceed as if they hold the lock.
    #[error("timed out after {waited_ms} ms waiting for {access:?} lock access")]
    LockTimeout {
        /// The kind of access that was requested.
        access: LockAccess,
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },

    /// A user callback failed inside the lock escalation helper.
    ///
    /// The lock is always released before this error is raised.
    #[error("{phase:?} callback failed during lock escalation: {message}")]
    ConditionCallback {
        /// Which escalation phase the callback ran in.
        phase: CallbackPhase,
        /// The callback's own error, rendered for context.
        message: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
