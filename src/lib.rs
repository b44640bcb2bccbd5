//! trigc - embeddable incremental tri-color mark-sweep garbage collection
//!
//! This crate provides the collection state machine only. The embedder
//! allocates objects, embeds a [`GcHeader`] in each one, registers them, and
//! implements [`Embedder`] to enumerate references and to be told when an
//! object has become garbage. The collector never allocates, frees or
//! dereferences object memory.
//!
//! Collection runs in discrete bounded-work steps (one scan or one release
//! per [`Gc::step`]), so it interleaves with mutator progress without long
//! pauses. While marking is in flight, every reference store must be paired
//! with [`Gc::write_barrier`] to keep the tri-color invariant intact;
//! cycles in the object graph are handled natively.
//!
//! Sketch of an embedding:
//!
//! ```ignore
//! #[repr(C)]
//! struct Node {
//!     header: GcHeader, // must come first
//!     next: Cell<Option<NonNull<Node>>>,
//! }
//!
//! impl Embedder for MyHeap {
//!     fn scan_roots(&mut self, marker: &mut Marker<'_>) {
//!         for root in &self.roots {
//!             unsafe { marker.visit(root.cast()) };
//!         }
//!     }
//!     fn scan(&mut self, obj: NonNull<GcHeader>, marker: &mut Marker<'_>) {
//!         if let Some(next) = unsafe { obj.cast::<Node>().as_ref() }.next.get() {
//!             unsafe { marker.visit(next.cast()) };
//!         }
//!     }
//!     fn release(&mut self, obj: NonNull<GcHeader>) {
//!         self.reclaim(obj.cast::<Node>());
//!     }
//! }
//! ```

mod collector;
mod header;
mod list;
pub mod logging;

pub use collector::{Barrier, Color, Embedder, Gc, GcStats, Marker, Phase};
pub use header::GcHeader;
