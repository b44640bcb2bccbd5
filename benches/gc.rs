use std::alloc::{alloc, dealloc, Layout};
use std::cell::Cell;
use std::ptr::NonNull;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use trigc::{Embedder, Gc, GcHeader, Marker};

#[repr(C)]
struct Node {
    header: GcHeader,
    next: Cell<Option<NonNull<Node>>>,
}

struct Chain {
    root: Option<NonNull<Node>>,
}

impl Embedder for Chain {
    fn scan_roots(&mut self, marker: &mut Marker<'_>) {
        if let Some(root) = self.root {
            unsafe { marker.visit(root.cast()) };
        }
    }

    fn scan(&mut self, obj: NonNull<GcHeader>, marker: &mut Marker<'_>) {
        if let Some(next) = unsafe { obj.cast::<Node>().as_ref() }.next.get() {
            unsafe { marker.visit(next.cast()) };
        }
    }

    fn release(&mut self, _obj: NonNull<GcHeader>) {}
}

/// Owns the node memory so benchmark teardown reclaims it.
struct Arena {
    nodes: Vec<NonNull<Node>>,
}

impl Arena {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn alloc(&mut self, gc: &mut Gc<Chain>) -> NonNull<Node> {
        let node = unsafe {
            let ptr = alloc(Layout::new::<Node>()) as *mut Node;
            ptr.write(Node {
                header: GcHeader::new(),
                next: Cell::new(None),
            });
            NonNull::new_unchecked(ptr)
        };
        unsafe { gc.register(node.cast()) };
        self.nodes.push(node);
        node
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for &node in &self.nodes {
            unsafe { dealloc(node.as_ptr() as *mut u8, Layout::new::<Node>()) };
        }
    }
}

/// Repeated full cycles over a 1000-node live chain: pure mark throughput.
fn bench_live_cycle(c: &mut Criterion) {
    let mut gc = Gc::new(Chain { root: None });
    let mut arena = Arena::new();
    let mut prev = None;
    for _ in 0..1000 {
        let node = arena.alloc(&mut gc);
        unsafe { node.as_ref() }.next.set(prev);
        prev = Some(node);
    }
    gc.embedder_mut().root = prev;

    c.bench_function("collect/live-1000", |b| {
        b.iter(|| {
            gc.collect();
            black_box(gc.stats());
        });
    });
}

/// Collecting 1000 unrooted objects: pure sweep throughput.
fn bench_churn(c: &mut Criterion) {
    c.bench_function("collect/garbage-1000", |b| {
        b.iter_batched_ref(
            || {
                let mut gc = Gc::new(Chain { root: None });
                let mut arena = Arena::new();
                for _ in 0..1000 {
                    arena.alloc(&mut gc);
                }
                (gc, arena)
            },
            |(gc, _arena)| gc.collect(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_live_cycle, bench_churn);
criterion_main!(benches);
