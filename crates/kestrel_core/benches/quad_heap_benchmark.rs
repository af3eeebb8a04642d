//! # Quad Heap Performance Benchmark
//!
//! ARCHITECT'S REQUIREMENTS:
//! - O(log n) inserts and priority updates, no side index map
//! - 0 allocations during steady-state churn
//!
//! Run with: `cargo bench --package kestrel_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kestrel_core::{QuadHeap, SlotTracked, NOT_IN_HEAP};
use std::cell::Cell;
use std::rc::Rc;

struct BenchNode {
    slot: Cell<i32>,
}

impl SlotTracked for BenchNode {
    fn slot(&self) -> i32 {
        self.slot.get()
    }

    fn set_slot(&self, slot: i32) {
        self.slot.set(slot);
    }
}

fn make_nodes(count: usize) -> Vec<Rc<BenchNode>> {
    (0..count)
        .map(|_| {
            Rc::new(BenchNode {
                slot: Cell::new(NOT_IN_HEAP),
            })
        })
        .collect()
}

/// Scrambled but deterministic cost for index `i`.
fn cost(i: usize) -> u64 {
    (i as u64).wrapping_mul(2_654_435_761) % 1_000_003
}

/// Benchmark: fill the heap and drain it in cost order.
fn bench_insert_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_pop");

    for count in [1_000usize, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut heap = QuadHeap::with_capacity(count);
                let nodes = make_nodes(count);
                for (i, node) in nodes.iter().enumerate() {
                    heap.insert_or_update(node, cost(i));
                }
                while let Ok((_, popped)) = heap.pop() {
                    black_box(popped);
                }
            });
        });
    }

    group.finish();
}

/// THE CRITICAL BENCHMARK: reprioritize every entry without re-insertion.
fn bench_decrease_key(c: &mut Criterion) {
    c.bench_function("decrease_key_10k", |b| {
        b.iter(|| {
            let mut heap = QuadHeap::with_capacity(10_000);
            let nodes = make_nodes(10_000);
            for (i, node) in nodes.iter().enumerate() {
                heap.insert_or_update(node, cost(i) + 2_000_000);
            }
            for (i, node) in nodes.iter().enumerate() {
                heap.insert_or_update(node, cost(i));
            }
            black_box(heap.len())
        });
    });
}

criterion_group!(benches, bench_insert_pop, bench_decrease_key);
criterion_main!(benches);
