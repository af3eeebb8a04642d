//! Toy scheduler wiring the heap and the scoped lock together: all heap
//! mutations happen under exclusive tokens, drains stay cost-ordered.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kestrel_core::{QuadHeap, ScopedRwLock, SlotTracked, NOT_IN_HEAP};
use parking_lot::Mutex;

#[derive(Debug)]
struct Job {
    id: usize,
    slot: AtomicI32,
}

impl Job {
    fn new(id: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            slot: AtomicI32::new(NOT_IN_HEAP),
        })
    }

    /// Deterministic scrambled cost so insertion order != pop order.
    fn cost(&self) -> u64 {
        ((self.id as u64).wrapping_mul(2_654_435_761) % 100_003) + 1
    }
}

impl SlotTracked for Job {
    fn slot(&self) -> i32 {
        self.slot.load(Ordering::Relaxed)
    }

    fn set_slot(&self, slot: i32) {
        self.slot.store(slot, Ordering::Relaxed);
    }
}

#[test]
fn scheduler_drains_in_cost_order() {
    let lock = ScopedRwLock::new();
    let mut heap: QuadHeap<u64, Arc<Job>> = QuadHeap::with_capacity(16);
    let jobs: Vec<Arc<Job>> = (0..64).map(Job::new).collect();

    for job in &jobs {
        let token = lock.write_scoped(Some(Duration::from_secs(1))).unwrap();
        heap.insert_or_update(job, job.cost());
        drop(token);
    }
    assert_eq!(heap.len(), jobs.len());

    let mut last = 0u64;
    while !heap.is_empty() {
        let token = lock.write_scoped(Some(Duration::from_secs(1))).unwrap();
        let (job, cost) = heap.pop().unwrap();
        drop(token);

        assert!(cost >= last, "pop order regressed");
        assert_eq!(cost, job.cost());
        assert_eq!(job.slot(), NOT_IN_HEAP);
        last = cost;
    }
}

#[test]
fn workers_drain_via_escalation() {
    const JOBS: usize = 200;
    const WORKERS: usize = 4;

    let lock = Arc::new(ScopedRwLock::new());
    let heap: Arc<Mutex<QuadHeap<u64, Arc<Job>>>> =
        Arc::new(Mutex::new(QuadHeap::with_capacity(64)));
    let drained = Arc::new(Mutex::new(Vec::new()));
    let remaining = Arc::new(AtomicUsize::new(JOBS));

    {
        let mut heap = heap.lock();
        for job in (0..JOBS).map(Job::new) {
            heap.insert_or_update(&job, job.cost());
        }
    }

    thread::scope(|scope| {
        for _ in 0..WORKERS {
            let lock = Arc::clone(&lock);
            let heap = Arc::clone(&heap);
            let drained = Arc::clone(&drained);
            let remaining = Arc::clone(&remaining);
            scope.spawn(move || {
                let token = lock
                    .read_when(
                        || Ok::<_, &str>(remaining.load(Ordering::Relaxed) == 0),
                        || {
                            // One job per escalation round, all under the
                            // exclusive token.
                            if let Ok((job, cost)) = heap.lock().pop() {
                                assert_eq!(job.slot(), NOT_IN_HEAP);
                                drained.lock().push(cost);
                                remaining.fetch_sub(1, Ordering::Relaxed);
                            }
                            Ok(())
                        },
                        Some(Duration::from_secs(5)),
                        100_000,
                    )
                    .unwrap();
                assert!(token.is_valid(), "worker never observed the drain");
            });
        }
    });

    let drained = drained.lock();
    assert_eq!(drained.len(), JOBS);
    assert!(
        drained.windows(2).all(|pair| pair[0] <= pair[1]),
        "global drain order regressed"
    );
    assert!(heap.lock().is_empty());
}
