//! Snapshot observation seam
//!
//! The process-wide reactive read-tracking system is an external
//! collaborator. This core depends on exactly two of its operations:
//! observe reads during a callback (and be told when any read value later
//! changes), and flush pending change notifications. Its internals are
//! never reimplemented here.

use std::rc::Rc;

/// Identifies one observation scope (e.g. "layout reads of owner X")
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObservationScope(pub u64);

/// External reactive read-tracking collaborator
pub trait SnapshotObserver {
    /// Run `block`, recording state reads under `scope`; `on_changed` is
    /// invoked when any recorded value is later written.
    fn observe_reads(
        &self,
        scope: ObservationScope,
        on_changed: Rc<dyn Fn()>,
        block: &mut dyn FnMut(),
    );

    /// Deliver queued change notifications now
    fn flush_pending(&self);

    /// Drop all observations recorded under `scope`
    fn clear_scope(&self, scope: ObservationScope);
}

/// Observer for hosts without a reactive runtime: runs blocks directly and
/// never reports changes.
#[derive(Default)]
pub struct NoopSnapshotObserver;

impl SnapshotObserver for NoopSnapshotObserver {
    fn observe_reads(
        &self,
        _scope: ObservationScope,
        _on_changed: Rc<dyn Fn()>,
        block: &mut dyn FnMut(),
    ) {
        block();
    }

    fn flush_pending(&self) {}

    fn clear_scope(&self, _scope: ObservationScope) {}
}
