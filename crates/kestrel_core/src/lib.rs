//! # KESTREL Core Utilities
//!
//! Host-independent building blocks for the KESTREL runtime:
//! - 4-ary indexed priority heap for scheduling-adjacent workloads
//! - Scoped reader-writer lock guarding shared native buffers
//!
//! ## Architecture Rules
//!
//! 1. **No host dependencies** - nothing here touches the scene graph,
//!    the job system, or the native allocator
//! 2. **The heap is not thread-safe** - callers wrap heap operations in
//!    a scoped lock when sharing across threads
//! 3. **Bounded waits only** - lock acquisitions always carry a timeout
//!    unless the caller explicitly opts into waiting forever
//!
//! ## Example
//!
//! ```rust,ignore
//! use kestrel_core::{QuadHeap, ScopedRwLock};
//!
//! let mut ready: QuadHeap<u64, JobRef> = QuadHeap::with_capacity(256);
//! let guard = ScopedRwLock::new();
//! // All heap mutations happen under guard.write_scoped(..)
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collections;
pub mod error;
pub mod sync;

pub use collections::{QuadHeap, SlotTracked, NOT_IN_HEAP};
pub use error::{CoreError, CoreResult};
pub use sync::{CallbackPhase, LockAccess, LockToken, ScopedRwLock};
