//! # Scoped Reader-Writer Lock
//!
//! Wraps a reader-writer mutex behind RAII tokens with bounded waits.
//!
//! Any number of readers may hold the lock concurrently, exclusive of a
//! single writer. Every acquisition returns a [`LockToken`] that releases
//! its acquisition exactly once, either on drop or through an explicit
//! [`LockToken::release`]. Acquisitions time out rather than blocking
//! forever unless the caller passes `None`.
//!
//! ## Escalation
//!
//! [`ScopedRwLock::read_when`] solves "read only once a predicate holds":
//! evaluate under a read lock, and when the predicate fails, escalate to a
//! write lock to establish it, then retry the read. Callers never observe
//! a window where the condition is inconsistent under their read lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[cfg(feature = "lock-audit")]
use std::collections::HashSet;

#[cfg(feature = "lock-audit")]
use parking_lot::Mutex;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{CoreError, CoreResult};

/// The kind of access a [`LockToken`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockAccess {
    /// Shared access; any number of readers may coexist.
    Read,
    /// Exclusive access; excludes all readers and other writers.
    Write,
}

/// Which escalation phase a user callback ran in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackPhase {
    /// The condition predicate, run under the read lock.
    Evaluate,
    /// The condition-establishing mutation, run under the write lock.
    Establish,
}

/// A reader-writer lock that hands out scoped, self-releasing tokens.
///
/// The lock guards external state by convention (shared native buffers,
/// a heap, ...); it carries no data of its own. Fairness and ordering are
/// those of the underlying `parking_lot::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// let lock = ScopedRwLock::new();
///
/// let token = lock.write_scoped(Some(Duration::from_millis(50)))?;
/// // ... mutate the guarded state ...
/// drop(token); // released exactly once
/// ```
pub struct ScopedRwLock {
    /// The underlying reader-writer mutex.
    inner: RwLock<()>,
    /// Monotonically increasing id source for issued tokens.
    next_token_id: AtomicU64,
    /// Ids of tokens currently holding an acquisition.
    #[cfg(feature = "lock-audit")]
    live_tokens: Mutex<HashSet<u64>>,
}

impl ScopedRwLock {
    /// Creates a new, unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(()),
            next_token_id: AtomicU64::new(0),
            #[cfg(feature = "lock-audit")]
            live_tokens: Mutex::new(HashSet::new()),
        }
    }

    /// Acquires shared (read) access.
    ///
    /// Blocks until the acquisition succeeds or `timeout` elapses. A
    /// `None` timeout waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if the timeout elapses first.
    pub fn read_scoped(&self, timeout: Option<Duration>) -> CoreResult<LockToken<'_>> {
        let guard = match timeout {
            None => self.inner.read(),
            Some(wait) => self.inner.try_read_for(wait).ok_or_else(|| {
                let waited_ms = saturating_ms(wait);
                tracing::trace!(waited_ms, "read acquisition timed out");
                CoreError::LockTimeout {
                    access: LockAccess::Read,
                    waited_ms,
                }
            })?,
        };
        Ok(self.issue(LockAccess::Read, HeldGuard::Read(guard)))
    }

    /// Acquires exclusive (write) access.
    ///
    /// Blocks until the acquisition succeeds or `timeout` elapses. A
    /// `None` timeout waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if the timeout elapses first.
    pub fn write_scoped(&self, timeout: Option<Duration>) -> CoreResult<LockToken<'_>> {
        let guard = match timeout {
            None => self.inner.write(),
            Some(wait) => self.inner.try_write_for(wait).ok_or_else(|| {
                let waited_ms = saturating_ms(wait);
                tracing::trace!(waited_ms, "write acquisition timed out");
                CoreError::LockTimeout {
                    access: LockAccess::Write,
                    waited_ms,
                }
            })?,
        };
        Ok(self.issue(LockAccess::Write, HeldGuard::Write(guard)))
    }

    /// Acquires read access once `evaluate` reports the guarded condition
    /// as established, escalating to a write lock to establish it when it
    /// is not.
    ///
    /// Per round: acquire read, run `evaluate`; on `true` the read token
    /// is returned while still held, so the condition cannot be torn down
    /// underneath the caller by anything that needs the write lock. On
    /// `false` the read lock is dropped, the write lock is acquired,
    /// `establish` runs, the write lock is dropped, and the round repeats.
    ///
    /// After `attempts` unsuccessful rounds an *invalid* token is
    /// returned; callers must check [`LockToken::is_valid`] before
    /// treating the condition as observed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::LockTimeout`] if any acquisition inside the loop
    ///   times out.
    /// - [`CoreError::ConditionCallback`] if either callback fails; the
    ///   held lock is released before the error propagates.
    pub fn read_when<E, P, F>(
        &self,
        mut evaluate: P,
        mut establish: F,
        timeout: Option<Duration>,
        attempts: u32,
    ) -> CoreResult<LockToken<'_>>
    where
        P: FnMut() -> Result<bool, E>,
        F: FnMut() -> Result<(), E>,
        E: fmt::Display,
    {
        for attempt in 0..attempts {
            let reader = self.read_scoped(timeout)?;
            match evaluate() {
                Ok(true) => return Ok(reader),
                Ok(false) => drop(reader),
                Err(source) => {
                    drop(reader);
                    return Err(CoreError::ConditionCallback {
                        phase: CallbackPhase::Evaluate,
                        message: source.to_string(),
                    });
                }
            }

            let writer = self.write_scoped(timeout)?;
            if let Err(source) = establish() {
                drop(writer);
                return Err(CoreError::ConditionCallback {
                    phase: CallbackPhase::Establish,
                    message: source.to_string(),
                });
            }
            drop(writer);
            tracing::trace!(attempt, "condition not yet established, retrying");
        }

        tracing::debug!(attempts, "escalation attempts exhausted");
        Ok(LockToken::invalid(self))
    }

    /// Number of tokens currently holding an acquisition.
    #[cfg(feature = "lock-audit")]
    #[must_use]
    pub fn live_token_count(&self) -> usize {
        self.live_tokens.lock().len()
    }

    /// Wraps a freshly acquired guard in a tracked token.
    fn issue<'a>(&'a self, access: LockAccess, guard: HeldGuard<'a>) -> LockToken<'a> {
        let id = self.next_token_id.fetch_add(1, Ordering::Relaxed);
        self.track(id);
        LockToken {
            lock: self,
            access,
            id,
            ever_held: true,
            guard: Some(guard),
        }
    }

    #[cfg(feature = "lock-audit")]
    fn track(&self, id: u64) {
        self.live_tokens.lock().insert(id);
    }

    #[cfg(not(feature = "lock-audit"))]
    fn track(&self, _id: u64) {}

    #[cfg(feature = "lock-audit")]
    fn untrack(&self, id: u64) {
        self.live_tokens.lock().remove(&id);
    }

    #[cfg(not(feature = "lock-audit"))]
    fn untrack(&self, _id: u64) {}

    /// Called when a token that already gave up its acquisition is
    /// explicitly released again. Loud under `lock-audit`, inert
    /// otherwise: a benign double-dispose must not crash a live system.
    #[cfg(feature = "lock-audit")]
    fn report_double_release(&self, id: u64) {
        debug_assert!(!self.live_tokens.lock().contains(&id));
        panic!("lock token {id} released twice");
    }

    #[cfg(not(feature = "lock-audit"))]
    fn report_double_release(&self, _id: u64) {}
}

impl Default for ScopedRwLock {
    fn default() -> Self {
        Self::new()
    }
}

/// The guard a valid token holds, by access kind.
#[allow(dead_code)] // guards are held for their Drop impls, never read
enum HeldGuard<'a> {
    /// A shared acquisition.
    Read(RwLockReadGuard<'a, ()>),
    /// An exclusive acquisition.
    Write(RwLockWriteGuard<'a, ()>),
}

/// A move-only token representing exactly one lock acquisition.
///
/// Dropping the token releases the acquisition exactly once; releasing an
/// already-released token is a silent no-op by default and a loud failure
/// under the `lock-audit` feature. Tokens returned by
/// [`ScopedRwLock::read_when`] may be *invalid* (no acquisition at all);
/// check [`LockToken::is_valid`] before relying on those.
pub struct LockToken<'a> {
    /// The lock that issued this token.
    lock: &'a ScopedRwLock,
    /// The kind of access this token was issued for.
    access: LockAccess,
    /// Unique, monotonically increasing token id.
    id: u64,
    /// Whether this token ever held an acquisition (false for invalid
    /// tokens, which must stay inert on release).
    ever_held: bool,
    /// The live acquisition, until first release.
    guard: Option<HeldGuard<'a>>,
}

impl<'a> LockToken<'a> {
    /// Builds the "empty" token returned when escalation attempts run
    /// out. Never tracked, never releases anything.
    fn invalid(lock: &'a ScopedRwLock) -> Self {
        Self {
            lock,
            access: LockAccess::Read,
            id: lock.next_token_id.fetch_add(1, Ordering::Relaxed),
            ever_held: false,
            guard: None,
        }
    }

    /// The kind of access this token was issued for.
    ///
    /// Meaningless for invalid tokens.
    #[inline]
    #[must_use]
    pub fn access(&self) -> LockAccess {
        self.access
    }

    /// Returns `true` while this token still holds its acquisition.
    ///
    /// Invalid tokens and released tokens report `false`.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.guard.is_some()
    }

    /// Unique id of this token. Diagnostic use.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Releases the held acquisition now instead of at drop.
    ///
    /// Releasing twice is a no-op in normal builds; under the
    /// `lock-audit` feature a second explicit release of a token that
    /// once held an acquisition panics to surface the programmer error.
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            self.lock.untrack(self.id);
        } else if self.ever_held {
            self.lock.report_double_release(self.id);
        }
    }
}

impl fmt::Debug for LockToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockToken")
            .field("access", &self.access)
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl Drop for LockToken<'_> {
    fn drop(&mut self) {
        // Drop after an explicit release must stay silent, audited or not.
        if self.guard.take().is_some() {
            self.lock.untrack(self.id);
        }
    }
}

/// Clamps a timeout to whole milliseconds for error reporting.
fn saturating_ms(wait: Duration) -> u64 {
    u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)
}


#[cfg(all(test, feature = "lock-audit"))]
mod audit_tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_audit_tracks_live_tokens() {
        let lock = ScopedRwLock::new();
        assert_eq!(lock.live_token_count(), 0);

        let mut token = lock.read_scoped(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(lock.live_token_count(), 1);

        token.release();
        assert_eq!(lock.live_token_count(), 0);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn test_audit_double_release_panics() {
        let lock = ScopedRwLock::new();
        let mut token = lock.write_scoped(Some(Duration::from_secs(1))).unwrap();
        token.release();
        token.release();
    }
}
