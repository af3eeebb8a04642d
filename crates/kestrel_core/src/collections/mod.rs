//! # Core Collections
//!
//! Cache-friendly data structures for scheduling-adjacent workloads.
//!
//! ## Design Philosophy
//!
//! Items carry their own bookkeeping (intrusive slot tracking) so the
//! structures never need side index maps:
//! - No hashing on the hot path
//! - O(log n) priority updates
//! - Predictable, flat latency

mod quad_heap;

pub use quad_heap::{QuadHeap, SlotTracked, NOT_IN_HEAP};
