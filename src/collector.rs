//! Collection state machine - incremental tri-color mark-sweep
//!
//! Design: two intrusive rings (from-set and to-set) partition every
//! registered object by color, and a cursor into the to-set separates
//! scanned objects from pending gray ones:
//! 1. Idle: everything sits white in the from-set
//! 2. Mark: visited objects move to the to-set; the cursor blackens them
//!    one scan callback per step
//! 3. Sweep: the sets swap roles and the white bit flips, so survivors are
//!    already colored for the next cycle and the old from-set drains one
//!    release per step
//!
//! The flip makes the sweep interruption-safe: objects registered between
//! sweep steps land among the survivors and can never be released by the
//! cycle in flight.

use core::mem;
use core::ptr::NonNull;

use crate::header::{self, GcHeader, GRAY};
use crate::list;
use crate::logging::{
    log_cycle_start, log_mark_complete, log_release_all, log_sweep_complete, trace,
};

/// Scanning and release behavior supplied by the embedder.
///
/// The embedder owns object memory; the collector only tracks liveness.
/// `scan_roots` and `scan` enumerate references by calling [`Marker::visit`]
/// on each one. `release` is the garbage notification: the object is proven
/// unreachable and the embedder may reclaim it. `release` must not touch any
/// other managed object.
pub trait Embedder {
    /// Visit every root object.
    ///
    /// Invoked at the start of a cycle and again when marking runs out of
    /// gray objects, since root stores carry no write barrier.
    fn scan_roots(&mut self, marker: &mut Marker<'_>);

    /// Visit every object `obj` holds a reference to.
    fn scan(&mut self, obj: NonNull<GcHeader>, marker: &mut Marker<'_>);

    /// `obj` is garbage; its header will never be touched again.
    fn release(&mut self, obj: NonNull<GcHeader>);
}

/// Collection phase. One [`Gc::step`] performs one unit of work in the
/// current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Mark,
    Sweep,
}

/// Logical object color, relative to the current white bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Unvisited; candidate garbage once marking completes.
    White,
    /// Discovered, children not yet scanned.
    Gray,
    /// Scanned; survives the cycle in flight.
    Black,
}

/// Write barrier direction, chosen per store site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// Gray the child so it gets scanned later.
    Forward,
    /// Re-gray the parent so it gets re-scanned; one re-scan amortizes
    /// many stores into the same object.
    Backward,
}

/// Running collection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Registered objects not yet released.
    pub live_objects: usize,
    /// Total release notifications delivered.
    pub objects_released: usize,
    /// Completed mark-sweep cycles.
    pub cycles_completed: usize,
}

/// Everything except the embedder: rings, cursor, white bit, phase.
///
/// Split out so a scan callback can hold a [`Marker`] over this while the
/// embedder itself is mutably borrowed for the callback.
struct Core {
    /// Sentinel of the ring holding unvisited whites (survivors, in Sweep).
    from: *mut GcHeader,
    /// Sentinel of the ring holding gray+black objects (garbage, in Sweep).
    to: *mut GcHeader,
    /// Mark: last blackened object; objects past it are gray.
    /// Sweep: next object to release.
    iterator: *mut GcHeader,
    /// Current white bit, inverted at every flip.
    white: u8,
    phase: Phase,
    stats: GcStats,
    marked_in_cycle: usize,
    swept_in_cycle: usize,
}

impl Core {
    fn new() -> Self {
        let from = Box::into_raw(Box::new(GcHeader::new()));
        let to = Box::into_raw(Box::new(GcHeader::new()));
        unsafe {
            list::reset(from);
            list::reset(to);
        }
        Self {
            from,
            to,
            iterator: to,
            white: 0,
            phase: Phase::Idle,
            stats: GcStats::default(),
            marked_in_cycle: 0,
            swept_in_cycle: 0,
        }
    }

    /// Move a white object into the to-set and color it gray.
    ///
    /// If the object is the current mark cursor, the cursor is rewound to
    /// its predecessor first, so the next `iterator.next` advance lands on
    /// the re-linked object instead of skipping past it.
    unsafe fn make_gray(&mut self, obj: *mut GcHeader) {
        if obj == self.iterator {
            self.iterator = header::prev(obj);
        }
        list::unlink(obj);
        list::push(self.to, obj);
        header::set_color_bits(obj, GRAY);
    }

    unsafe fn visit(&mut self, obj: *mut GcHeader) {
        debug_assert_eq!(self.phase, Phase::Mark, "visit outside the mark phase");
        if header::color_bits(obj) == self.white {
            trace!(target: "gc", address = ?obj, "visit: white -> gray");
            self.make_gray(obj);
        }
    }

    unsafe fn color(&self, obj: *mut GcHeader) -> Color {
        match header::color_bits(obj) {
            GRAY => Color::Gray,
            c if c == self.white => Color::White,
            _ => Color::Black,
        }
    }

    /// Mark is complete: swap set roles, invert white, aim the cursor at the
    /// first object to release. Survivors keep their color bit, which now
    /// reads as the new white, so no reset pass is needed.
    unsafe fn flip(&mut self) {
        debug_assert_eq!(self.phase, Phase::Mark);
        mem::swap(&mut self.from, &mut self.to);
        self.white ^= 1;
        self.iterator = header::next(self.to);
        self.phase = Phase::Sweep;
        log_mark_complete(self.marked_in_cycle);
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        // Registered objects are embedder-owned; only the sentinels are ours.
        unsafe {
            drop(Box::from_raw(self.from));
            drop(Box::from_raw(self.to));
        }
    }
}

/// An incremental tri-color mark-sweep collector.
///
/// The collector is a self-contained value: no global state, one mutator
/// thread. It never allocates or frees object memory; the embedder registers
/// headers of objects it allocated and reclaims them on release.
pub struct Gc<E: Embedder> {
    core: Core,
    embedder: E,
}

/// Visit capability handed to scan callbacks.
///
/// Only the collector constructs these, for the duration of one scan
/// invocation, so `visit` is callable exactly where the algorithm allows it
/// and a callback cannot re-enter `step`, `collect` or `release_all`.
pub struct Marker<'gc> {
    core: &'gc mut Core,
}

impl Marker<'_> {
    /// Inform the collector of a reference to `obj`.
    ///
    /// White objects turn gray and queue for scanning; gray and black
    /// objects are left alone.
    ///
    /// # Safety
    ///
    /// `obj` must be registered with the collector this marker belongs to.
    pub unsafe fn visit(&mut self, obj: NonNull<GcHeader>) {
        self.core.visit(obj.as_ptr());
    }
}

impl<E: Embedder> Gc<E> {
    /// A collector in the idle phase with empty sets.
    pub fn new(embedder: E) -> Self {
        Self {
            core: Core::new(),
            embedder,
        }
    }

    /// Hand an object over to the collector.
    ///
    /// The object joins the from-set as current-white: in Idle it is an
    /// ordinary collection candidate for the next cycle, in Sweep it sits
    /// among the survivors and cannot be released by the cycle in flight.
    /// In Mark it must be connected to the graph (rooted, or stored with a
    /// write barrier) before marking completes, like any other white object.
    ///
    /// # Safety
    ///
    /// `obj` must not already be registered, must stay at a stable address,
    /// and must remain valid until its release notification (or
    /// [`Gc::release_all`]). The embedder must not touch the header fields
    /// while the object is registered.
    pub unsafe fn register(&mut self, obj: NonNull<GcHeader>) {
        let obj = obj.as_ptr();
        trace!(target: "gc", address = ?obj, "register");
        list::push(self.core.from, obj);
        header::set_color_bits(obj, self.core.white);
        self.core.stats.live_objects += 1;
    }

    /// Maintain the tri-color invariant across a reference store
    /// `parent -> child`.
    ///
    /// Only a store that would make a black object point at a white one
    /// does anything: [`Barrier::Forward`] grays the child,
    /// [`Barrier::Backward`] re-grays the parent. Outside the mark phase no
    /// reachable object is black, so the call is a no-op. Root stores need
    /// no barrier; roots are re-scanned when marking drains.
    ///
    /// # Safety
    ///
    /// Both headers must be registered with this collector.
    pub unsafe fn write_barrier(
        &mut self,
        direction: Barrier,
        parent: NonNull<GcHeader>,
        child: NonNull<GcHeader>,
    ) {
        let core = &mut self.core;
        let white = core.white;
        let black = white ^ 1;
        let parent = parent.as_ptr();
        let child = child.as_ptr();

        if header::color_bits(parent) == black && header::color_bits(child) == white {
            trace!(target: "gc", parent = ?parent, child = ?child, ?direction, "barrier");
            match direction {
                Barrier::Forward => core.make_gray(child),
                Barrier::Backward => core.make_gray(parent),
            }
        }
    }

    /// Perform one unit of collection work.
    ///
    /// - Idle: scan the roots and enter Mark.
    /// - Mark: blacken and scan one object. With no gray object left,
    ///   re-scan the roots (root stores carry no barrier); if that turns up
    ///   nothing new, flip and enter Sweep.
    /// - Sweep: release one object, or reset and return to Idle when the
    ///   garbage ring is drained.
    pub fn step(&mut self) {
        let Gc { core, embedder } = self;
        match core.phase {
            Phase::Idle => {
                core.phase = Phase::Mark;
                core.marked_in_cycle = 0;
                core.swept_in_cycle = 0;
                log_cycle_start();
                let mut marker = Marker { core: &mut *core };
                embedder.scan_roots(&mut marker);
            }
            Phase::Mark => unsafe {
                let obj = header::next(core.iterator);
                if obj != core.to {
                    core.iterator = obj;
                    header::set_color_bits(obj, core.white ^ 1);
                    core.marked_in_cycle += 1;
                    trace!(target: "gc", address = ?obj, "mark: gray -> black");
                    let mut marker = Marker { core: &mut *core };
                    embedder.scan(NonNull::new_unchecked(obj), &mut marker);
                } else {
                    {
                        let mut marker = Marker { core: &mut *core };
                        embedder.scan_roots(&mut marker);
                    }
                    if header::next(core.iterator) == core.to {
                        core.flip();
                    }
                }
            },
            Phase::Sweep => unsafe {
                let obj = core.iterator;
                if obj != core.to {
                    // Advance before releasing so the callback cannot
                    // observe a dangling cursor.
                    core.iterator = header::next(obj);
                    core.stats.live_objects -= 1;
                    core.stats.objects_released += 1;
                    core.swept_in_cycle += 1;
                    trace!(target: "gc", address = ?obj, "sweep: release");
                    embedder.release(NonNull::new_unchecked(obj));
                } else {
                    list::reset(core.to);
                    core.phase = Phase::Idle;
                    core.stats.cycles_completed += 1;
                    log_sweep_complete(core.swept_in_cycle);
                }
            },
        }
    }

    /// Run the collector until it returns to Idle.
    ///
    /// Every object unreachable at some observation point during the call
    /// (and not resurrected) is released before this returns. If the
    /// collector is already sweeping, garbage created since the flip is
    /// left for the next cycle.
    pub fn collect(&mut self) {
        if self.core.phase == Phase::Idle {
            self.step();
        }
        while self.core.phase != Phase::Idle {
            self.step();
        }
    }

    /// Release every registered object without running a mark phase.
    ///
    /// Intended for teardown; faster than clearing the roots and forcing a
    /// full cycle. Afterwards the collector is back in its initial state
    /// and may be reused or dropped.
    pub fn release_all(&mut self) {
        let Gc { core, embedder } = self;
        let mut released = 0usize;
        unsafe {
            for set in [core.from, core.to] {
                let mut itr = header::next(set);
                while itr != set {
                    let next = header::next(itr);
                    embedder.release(NonNull::new_unchecked(itr));
                    released += 1;
                    itr = next;
                }
            }
            list::reset(core.from);
            list::reset(core.to);
            debug_assert!(list::is_empty(core.from) && list::is_empty(core.to));
        }
        core.iterator = core.to;
        core.white = 0;
        core.phase = Phase::Idle;
        core.stats.live_objects = 0;
        core.stats.objects_released += released;
        log_release_all(released);
    }

    /// Current collection phase.
    pub fn phase(&self) -> Phase {
        self.core.phase
    }

    /// Logical color of a registered object. Diagnostics and tests only.
    ///
    /// # Safety
    ///
    /// `obj` must be registered with this collector.
    pub unsafe fn color(&self, obj: NonNull<GcHeader>) -> Color {
        self.core.color(obj.as_ptr())
    }

    /// Running counters.
    pub fn stats(&self) -> GcStats {
        self.core.stats
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn embedder_mut(&mut self) -> &mut E {
        &mut self.embedder
    }
}
