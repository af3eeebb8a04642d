//! # Scoped Synchronization
//!
//! Reader-writer locking with RAII tokens and bounded waits.
//!
//! ## The Problem
//!
//! ```text
//! Thread 1 (Logic):   WRITE to shared native buffers
//! Thread 2 (Render):  READ from shared native buffers
//!
//! Raw mutex handling: forgotten unlocks, double unlocks, unbounded waits
//! ```
//!
//! ## The Solution: Scoped Tokens
//!
//! Every acquisition hands back a move-only [`LockToken`] that releases
//! exactly once when dropped. Acquisitions carry a timeout, so a stalled
//! writer surfaces as an error instead of a hung thread. The escalation
//! helper covers the "read only once a condition holds" pattern without
//! racy release-and-upgrade windows in caller code.

mod scoped_rwlock;

pub use scoped_rwlock::{CallbackPhase, LockAccess, LockToken, ScopedRwLock};
