//! # 4-ary Indexed Priority Heap
//!
//! A min-heap over `(cost, item)` pairs where every item tracks its own
//! current heap slot through an intrusive integer cell.
//!
//! The stored slot makes decrease-key and increase-key O(log n) without a
//! separate index map: updating an item's priority starts the sift directly
//! from the slot recorded on the item.
//!
//! ## Layout
//!
//! ```text
//! slot:     0    1  2  3  4    5  6  7  8 ...
//!           root └──children of 0──┘ └─ children of 1 ...
//!
//! parent(i) = (i - 1) / 4        first_child(i) = i * 4 + 1
//! ```
//!
//! A branching factor of 4 halves the tree depth versus a binary heap and
//! keeps each child group inside one cache line for small entries.

use std::rc::Rc;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};

/// Branching factor of the heap.
const ARITY: usize = 4;

/// Reserved slot value meaning "this item is not currently in any heap".
///
/// Items must initialize their slot cell to this value; the heap writes it
/// back whenever an item leaves the heap. Never a valid index.
pub const NOT_IN_HEAP: i32 = -1;

/// Capability trait for items that carry their current heap slot.
///
/// Implementations use interior mutability (`Cell<i32>`, `AtomicI32`, ...)
/// so the heap can update the slot through a shared reference. The cell
/// belongs to the heap while the item is enqueued: callers read it, but
/// only the heap writes it.
pub trait SlotTracked {
    /// Returns the item's current heap slot, or [`NOT_IN_HEAP`].
    fn slot(&self) -> i32;

    /// Records the item's new heap slot.
    fn set_slot(&self, slot: i32);
}

impl<T: SlotTracked + ?Sized> SlotTracked for Rc<T> {
    #[inline]
    fn slot(&self) -> i32 {
        (**self).slot()
    }

    #[inline]
    fn set_slot(&self, slot: i32) {
        (**self).set_slot(slot);
    }
}

impl<T: SlotTracked + ?Sized> SlotTracked for Arc<T> {
    #[inline]
    fn slot(&self) -> i32 {
        (**self).slot()
    }

    #[inline]
    fn set_slot(&self, slot: i32) {
        (**self).set_slot(slot);
    }
}

/// One live heap entry: an item and its current cost.
struct Entry<C, T> {
    /// The priority this entry is ordered by (lower pops first).
    cost: C,
    /// The tracked item. Shares its slot cell with the caller's copy.
    item: T,
}

/// A 4-ary indexed min-heap.
///
/// Lower costs pop first. Each item appears at most once, enforced by the
/// item's own slot cell rather than an explicit membership set.
///
/// # Thread Safety
///
/// This heap is NOT thread-safe. Callers guard shared heaps with
/// [`crate::sync::ScopedRwLock`] or equivalent.
///
/// # Type Parameters
///
/// * `C` - The cost type. Assumed totally ordered; comparisons are strict,
///   so incomparable pairs (e.g. NaN floats) never trigger a move.
/// * `T` - The item type. Typically an `Rc`/`Arc` of a node so that the
///   heap's clone and the caller's copy share one slot cell.
///
/// # Example
///
/// ```rust,ignore
/// let mut heap: QuadHeap<u64, Rc<Job>> = QuadHeap::with_capacity(256);
/// heap.insert_or_update(&job, 42);      // insert
/// heap.insert_or_update(&job, 7);       // decrease-key
/// let (popped, cost) = heap.pop()?;     // lowest cost first
/// ```
pub struct QuadHeap<C, T> {
    /// Dense backing storage. Slots `0..len` are always `Some`.
    slots: Box<[Option<Entry<C, T>>]>,
    /// Number of live entries.
    len: usize,
}

impl<C, T> QuadHeap<C, T>
where
    C: PartialOrd + Copy,
    T: SlotTracked + Clone,
{
    /// Creates an empty heap able to hold at least `capacity` entries.
    ///
    /// The actual capacity is rounded up so that `(capacity - 1) % 4 == 0`.
    /// This keeps every child group fully inside the backing array, so
    /// sift operations only ever compare against the live count.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let rounded = round_capacity(capacity);
        Self {
            slots: (0..rounded).map(|_| None).collect(),
            len: 0,
        }
    }

    /// Returns the number of entries currently in the heap.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the heap holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current capacity of the backing storage.
    ///
    /// Always satisfies `(capacity - 1) % 4 == 0`. Capacity never shrinks.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Inserts `item` with `cost`, or updates its cost if already present.
    ///
    /// Behavior depends on the item's slot cell:
    /// - [`NOT_IN_HEAP`]: insert as a new entry, growing storage first if
    ///   full, then sift toward the root.
    /// - Already present: compare `cost` against the stored cost. Strictly
    ///   lower sifts the entry toward the root (decrease-key); strictly
    ///   higher sifts it toward the leaves (increase-key); equal cost is a
    ///   no-op.
    ///
    /// # Arguments
    ///
    /// * `item` - The item to enqueue or reprioritize. The heap clones it
    ///   on first insert; both copies share the slot cell.
    /// * `cost` - The new priority.
    pub fn insert_or_update(&mut self, item: &T, cost: C) {
        let slot = item.slot();
        if slot == NOT_IN_HEAP {
            if self.len == self.slots.len() {
                self.grow();
            }
            let idx = self.len;
            self.len += 1;
            self.sift_toward_root(
                idx,
                Entry {
                    cost,
                    item: item.clone(),
                },
            );
            return;
        }

        let idx = slot as usize;
        let Some(old_cost) = self.slots.get(idx).and_then(Option::as_ref).map(|e| e.cost)
        else {
            debug_assert!(false, "item slot cell out of sync with heap storage");
            return;
        };

        if cost < old_cost {
            if let Some(mut entry) = self.slots[idx].take() {
                entry.cost = cost;
                self.sift_toward_root(idx, entry);
            }
        } else if cost > old_cost {
            if let Some(mut entry) = self.slots[idx].take() {
                entry.cost = cost;
                self.sift_toward_leaves(idx, entry, self.len);
            }
        }
        // Equal cost: genuine no-op.
    }

    /// Removes and returns the minimum-cost entry as `(item, cost)`.
    ///
    /// The removed item's slot cell is reset to [`NOT_IN_HEAP`] before the
    /// remaining entries are re-ordered.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyHeap`] if the heap is empty. Popping an
    /// empty heap is a caller-side precondition violation.
    pub fn pop(&mut self) -> CoreResult<(T, C)> {
        let Some(root) = self.slots.first_mut().and_then(Option::take) else {
            return Err(CoreError::EmptyHeap);
        };
        root.item.set_slot(NOT_IN_HEAP);
        self.len -= 1;

        if self.len > 0 {
            // Move the former last entry to the root and restore order.
            if let Some(last) = self.slots[self.len].take() {
                self.sift_toward_leaves(0, last, self.len);
            }
        }
        Ok((root.item, root.cost))
    }

    /// Removes all entries, resetting every live item's slot cell to
    /// [`NOT_IN_HEAP`]. Capacity is retained.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut().take(self.len) {
            if let Some(entry) = slot.take() {
                entry.item.set_slot(NOT_IN_HEAP);
            }
        }
        self.len = 0;
    }

    /// Returns the item stored at `slot`, if that slot is live.
    ///
    /// Diagnostic accessor; `slot` normally comes from an item's own cell.
    #[inline]
    #[must_use]
    pub fn item_at(&self, slot: i32) -> Option<&T> {
        let idx = usize::try_from(slot).ok()?;
        self.slots.get(idx)?.as_ref().map(|e| &e.item)
    }

    /// Returns the cost stored at `slot`, if that slot is live.
    #[inline]
    #[must_use]
    pub fn cost_at(&self, slot: i32) -> Option<C> {
        let idx = usize::try_from(slot).ok()?;
        self.slots.get(idx)?.as_ref().map(|e| e.cost)
    }

    /// Grows the backing storage: double, or +4 slots, whichever is
    /// larger, then rounded to the capacity invariant.
    fn grow(&mut self) {
        let old_cap = self.slots.len();
        let new_cap = round_capacity((old_cap * 2).max(old_cap + ARITY));
        let mut slots: Vec<Option<Entry<C, T>>> = (0..new_cap).map(|_| None).collect();
        for (new_slot, old_slot) in slots.iter_mut().zip(self.slots.iter_mut()) {
            *new_slot = old_slot.take();
        }
        self.slots = slots.into_boxed_slice();
    }

    /// Sifts `entry` from `idx` toward the root (decrease-key direction).
    ///
    /// Parents with cost >= the candidate move down into the vacated slot;
    /// the candidate lands where its cost beats the parent or at the root.
    fn sift_toward_root(&mut self, mut idx: usize, entry: Entry<C, T>) {
        while idx > 0 {
            let parent_idx = (idx - 1) / ARITY;
            let displace = match self.slots[parent_idx].as_ref() {
                Some(parent) => entry.cost <= parent.cost,
                None => false,
            };
            if !displace {
                break;
            }
            let parent = self.slots[parent_idx].take();
            if let Some(p) = parent.as_ref() {
                p.item.set_slot(idx as i32);
            }
            self.slots[idx] = parent;
            idx = parent_idx;
        }
        entry.item.set_slot(idx as i32);
        self.slots[idx] = Some(entry);
    }

    /// Sifts `entry` from `idx` toward the leaves (increase-key direction).
    ///
    /// At each level the smallest of up to 4 children within `active` is
    /// selected; it moves up into the vacated slot only if strictly
    /// cheaper than the candidate, so equal costs never swap.
    fn sift_toward_leaves(&mut self, mut idx: usize, entry: Entry<C, T>, active: usize) {
        loop {
            let first_child = idx * ARITY + 1;
            if first_child >= active {
                break;
            }
            let last_child = (first_child + ARITY - 1).min(active - 1);

            let mut best_idx = first_child;
            let mut best_cost = match self.slots[first_child].as_ref() {
                Some(child) => child.cost,
                None => break,
            };
            for child_idx in (first_child + 1)..=last_child {
                if let Some(child) = self.slots[child_idx].as_ref() {
                    if child.cost < best_cost {
                        best_idx = child_idx;
                        best_cost = child.cost;
                    }
                }
            }

            if best_cost < entry.cost {
                let child = self.slots[best_idx].take();
                if let Some(c) = child.as_ref() {
                    c.item.set_slot(idx as i32);
                }
                self.slots[idx] = child;
                idx = best_idx;
            } else {
                break;
            }
        }
        entry.item.set_slot(idx as i32);
        self.slots[idx] = Some(entry);
    }

    /// Full O(n) structural check: heap property over every parent/child
    /// pair and slot-cell agreement for every live entry.
    ///
    /// Test builds only; never runs in production paths.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[cfg(any(test, feature = "heap-validation"))]
    pub fn assert_valid(&self) {
        for idx in 0..self.len {
            let entry = self.slots[idx]
                .as_ref()
                .unwrap_or_else(|| panic!("live slot {idx} is empty"));
            assert_eq!(
                entry.item.slot(),
                idx as i32,
                "slot cell out of sync at {idx}"
            );
            if idx > 0 {
                let parent_idx = (idx - 1) / ARITY;
                let parent = self.slots[parent_idx]
                    .as_ref()
                    .unwrap_or_else(|| panic!("live slot {parent_idx} is empty"));
                assert!(
                    parent.cost <= entry.cost,
                    "heap property violated between {parent_idx} and {idx}"
                );
            }
        }
        for idx in self.len..self.slots.len() {
            assert!(self.slots[idx].is_none(), "dead slot {idx} holds an entry");
        }
    }
}

/// Rounds `capacity` up to the smallest value satisfying
/// `(capacity - 1) % 4 == 0`, with a floor of one slot.
const fn round_capacity(capacity: usize) -> usize {
    let capacity = if capacity == 0 { 1 } else { capacity };
    let rem = (capacity - 1) % ARITY;
    if rem == 0 {
        capacity
    } else {
        capacity + (ARITY - rem)
    }
}
