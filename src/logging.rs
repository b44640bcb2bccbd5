//! Logging utilities for the collector
//!
//! Lightweight structured logging for collection events. Uses `tracing` so
//! an embedder that already has a subscriber gets collector events for free;
//! `init_logging` installs a sensible default subscriber for programs that
//! have none.

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

/// Install a default fmt subscriber honoring `RUST_LOG`.
///
/// Debug builds default to `trigc=debug`, release builds to `trigc=info`.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("trigc=debug")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("trigc=info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

/// Log the start of a collection cycle
#[inline]
pub fn log_cycle_start() {
    debug!(target: "gc", "starting collection cycle");
}

/// Log mark-phase completion
#[inline]
pub fn log_mark_complete(objects_marked: usize) {
    debug!(
        target: "gc",
        objects_marked,
        "mark phase complete"
    );
}

/// Log sweep-phase completion
#[inline]
pub fn log_sweep_complete(objects_released: usize) {
    info!(
        target: "gc",
        objects_released,
        "collection cycle complete"
    );
}

/// Log a bulk teardown
#[inline]
pub fn log_release_all(objects_released: usize) {
    info!(
        target: "gc",
        objects_released,
        "released all registered objects"
    );
}
