//! Frame recomposer and frame clock
//!
//! One logical frame tick runs two cooperative task queues: `Recompose`
//! (re-execute invalidated content) and `Effects` (deferred side effects of
//! composition). [`FrameRecomposer::flush`] drains both synchronously and
//! re-entrantly, so a recomposition triggered by a state write during the
//! flush is visible before the flush returns — nothing is deferred past the
//! current frame unless it was scheduled from outside the tick.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Task scheduled onto the recomposer
pub type Task = Box<dyn FnOnce()>;

/// Scheduling phase within one frame tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Re-run invalidated content closures
    Recompose,
    /// Flush deferred side effects of composition
    Effects,
}

#[derive(Default)]
struct Queues {
    recompose: VecDeque<Task>,
    effects: VecDeque<Task>,
}

/// Cooperative per-frame task scheduler.
///
/// Cheaply cloneable handle; clones share the same queues so content
/// closures can schedule work onto the scene's recomposer.
#[derive(Clone, Default)]
pub struct FrameRecomposer {
    queues: Rc<RefCell<Queues>>,
}

impl FrameRecomposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task for the given phase of the current/next flush
    pub fn schedule(&self, phase: Phase, task: Task) {
        let mut queues = self.queues.borrow_mut();
        match phase {
            Phase::Recompose => queues.recompose.push_back(task),
            Phase::Effects => queues.effects.push_back(task),
        }
    }

    /// True if any task is queued in either phase
    pub fn has_pending_work(&self) -> bool {
        let queues = self.queues.borrow();
        !queues.recompose.is_empty() || !queues.effects.is_empty()
    }

    /// Drain both queues until empty.
    ///
    /// Tasks scheduled while draining (including from within tasks) are
    /// drained too. Recompositions run before the effects they produce.
    pub fn flush(&self) {
        loop {
            let task = {
                let mut queues = self.queues.borrow_mut();
                queues
                    .recompose
                    .pop_front()
                    .or_else(|| queues.effects.pop_front())
            };
            // Borrow released before the task runs: the task may schedule
            // more work on this same recomposer.
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

/// One-shot frame callbacks, run once when the clock advances.
///
/// Callbacks registered during a tick run on the next tick.
#[derive(Clone, Default)]
pub struct FrameClock {
    callbacks: Rc<RefCell<Vec<Box<dyn FnOnce(u64)>>>>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked with the next frame time in nanoseconds
    pub fn with_frame_nanos<F>(&self, callback: F)
    where
        F: FnOnce(u64) + 'static,
    {
        self.callbacks.borrow_mut().push(Box::new(callback));
    }

    /// True if any frame callback is waiting
    pub fn has_awaiters(&self) -> bool {
        !self.callbacks.borrow().is_empty()
    }

    /// Run all callbacks registered before this tick exactly once
    pub fn advance(&self, frame_time_nanos: u64) {
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        if !callbacks.is_empty() {
            tracing::trace!(count = callbacks.len(), "running frame callbacks");
        }
        for callback in callbacks {
            callback(frame_time_nanos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_drains_scheduled_during_drain() {
        let recomposer = FrameRecomposer::new();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let inner = recomposer.clone();
        let log = Rc::clone(&order);
        recomposer.schedule(
            Phase::Recompose,
            Box::new(move || {
                log.borrow_mut().push("recompose");
                let nested_log = Rc::clone(&log);
                inner.schedule(
                    Phase::Effects,
                    Box::new(move || {
                        nested_log.borrow_mut().push("effect");
                    }),
                );
            }),
        );

        assert!(recomposer.has_pending_work());
        recomposer.flush();
        assert!(!recomposer.has_pending_work());
        assert_eq!(*order.borrow(), vec!["recompose", "effect"]);
    }

    #[test]
    fn test_recompose_runs_before_effects() {
        let recomposer = FrameRecomposer::new();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        recomposer.schedule(Phase::Effects, Box::new(move || log.borrow_mut().push("e")));
        let log = Rc::clone(&order);
        recomposer.schedule(Phase::Recompose, Box::new(move || log.borrow_mut().push("r")));

        recomposer.flush();
        assert_eq!(*order.borrow(), vec!["r", "e"]);
    }

    #[test]
    fn test_frame_clock_one_shot() {
        let clock = FrameClock::new();
        let times: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&times);
        clock.with_frame_nanos(move |nanos| log.borrow_mut().push(nanos));
        assert!(clock.has_awaiters());

        clock.advance(16_000_000);
        clock.advance(32_000_000);
        // Ran exactly once, on the first tick
        assert_eq!(*times.borrow(), vec![16_000_000]);
        assert!(!clock.has_awaiters());
    }

    #[test]
    fn test_callback_registered_during_tick_runs_next_tick() {
        let clock = FrameClock::new();
        let times: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));

        let inner_clock = clock.clone();
        let log = Rc::clone(&times);
        clock.with_frame_nanos(move |nanos| {
            log.borrow_mut().push(nanos);
            let nested_log = Rc::clone(&log);
            inner_clock.with_frame_nanos(move |nanos| nested_log.borrow_mut().push(nanos));
        });

        clock.advance(1);
        assert_eq!(*times.borrow(), vec![1]);
        clock.advance(2);
        assert_eq!(*times.borrow(), vec![1, 2]);
    }
}
