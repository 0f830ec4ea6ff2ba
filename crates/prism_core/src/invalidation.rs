//! Invalidation tracking for the frame pipeline
//!
//! Recomposition can request layout or draw work many times between frames;
//! the tracker coalesces those requests into sticky flags that the frame
//! pipeline queries once per phase. The flags and the external invalidate
//! callback are the only parts of the engine that may be touched from a
//! thread other than the logical UI thread, so both are atomic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Deferred state-application command, run at the start of the next
/// layout or draw phase
pub type DeferredCommand = Box<dyn FnOnce() + Send>;

/// Zero-argument "please schedule a frame" signal delivered to the host
pub type InvalidateCallback = Arc<dyn Fn() + Send + Sync>;

/// Coalesces redraw/relayout requests into per-frame sticky flags.
///
/// The clear-before-apply ordering in [`on_layout`](Self::on_layout) and
/// [`on_draw`](Self::on_draw) is load-bearing: applying a deferred command
/// can itself request further layout or draw, and that request must re-arm
/// the flag rather than be lost with the old value.
pub struct InvalidationTracker {
    needs_layout: AtomicBool,
    needs_draw: AtomicBool,
    deferred: Mutex<Vec<DeferredCommand>>,
    invalidate: InvalidateCallback,
}

impl InvalidationTracker {
    pub fn new(invalidate: InvalidateCallback) -> Self {
        Self {
            needs_layout: AtomicBool::new(false),
            needs_draw: AtomicBool::new(false),
            deferred: Mutex::new(Vec::new()),
            invalidate,
        }
    }

    /// Request a layout pass. Callable from any thread.
    pub fn request_layout(&self) {
        self.needs_layout.store(true, Ordering::Release);
        (self.invalidate)();
    }

    /// Request a draw pass. Callable from any thread.
    pub fn request_draw(&self) {
        self.needs_draw.store(true, Ordering::Release);
        (self.invalidate)();
    }

    /// Queue a command to run before the next layout/draw phase
    pub fn defer(&self, command: DeferredCommand) {
        self.deferred.lock().unwrap().push(command);
        (self.invalidate)();
    }

    /// Begin the layout phase: clear the layout flag, then apply deferred
    /// commands (which may re-request layout).
    pub fn on_layout(&self) {
        self.needs_layout.store(false, Ordering::Release);
        self.apply_deferred();
    }

    /// Begin the draw phase: clear the draw flag, then apply deferred
    /// commands (which may re-request draw).
    pub fn on_draw(&self) {
        self.needs_draw.store(false, Ordering::Release);
        self.apply_deferred();
    }

    /// True while layout or draw work is pending, or any deferred command
    /// is queued. Callable from any thread.
    pub fn has_invalidations(&self) -> bool {
        self.needs_layout.load(Ordering::Acquire)
            || self.needs_draw.load(Ordering::Acquire)
            || !self.deferred.lock().unwrap().is_empty()
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout.load(Ordering::Acquire)
    }

    pub fn needs_draw(&self) -> bool {
        self.needs_draw.load(Ordering::Acquire)
    }

    fn apply_deferred(&self) {
        // Drain under the lock, run outside it: a command may call defer()
        // or request_layout() on this same tracker.
        loop {
            let commands: Vec<DeferredCommand> =
                std::mem::take(&mut *self.deferred.lock().unwrap());
            if commands.is_empty() {
                break;
            }
            tracing::trace!(count = commands.len(), "applying deferred commands");
            for command in commands {
                command();
            }
        }
    }
}
