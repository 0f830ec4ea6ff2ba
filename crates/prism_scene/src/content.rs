//! Composition seam
//!
//! The declarative composition runtime is an external collaborator; the
//! scene only needs the boundary modeled here: a content closure that
//! (re)builds an owner's node tree, wrapped in a [`Composition`] handle
//! that re-runs it when the recomposer schedules a recompose task and that
//! is disposed exactly once when the content root is swapped or the owner
//! torn down.
//!
//! Every re-run happens under a [`SnapshotObserver`] scope: state the
//! content reads is recorded, and a later write to any recorded value
//! invokes the composition's change callback, which schedules the next
//! recompose. Disposal clears the scope so stale observations never fire.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use prism_core::{ObservationScope, SnapshotObserver};

use crate::node::NodeTree;
use crate::owner::Owner;

/// Content closure that populates an owner's node tree
pub type Content = Box<dyn FnMut(&mut NodeTree)>;

fn next_scope() -> ObservationScope {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    ObservationScope(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Installed content root for one owner
pub struct Composition {
    owner: Rc<RefCell<Owner>>,
    content: RefCell<Content>,
    observer: Rc<dyn SnapshotObserver>,
    /// Observation scope for this root's reads, cleared on dispose
    scope: ObservationScope,
    /// Invoked by the observer when a recorded read is later written
    on_changed: Rc<dyn Fn()>,
    disposed: Cell<bool>,
}

impl Composition {
    pub fn new(
        owner: Rc<RefCell<Owner>>,
        content: Content,
        observer: Rc<dyn SnapshotObserver>,
        on_changed: Rc<dyn Fn()>,
    ) -> Self {
        Self {
            owner,
            content: RefCell::new(content),
            observer,
            scope: next_scope(),
            on_changed,
            disposed: Cell::new(false),
        }
    }

    pub fn scope(&self) -> ObservationScope {
        self.scope
    }

    /// Re-run the content closure against a cleared tree, recording its
    /// state reads under this composition's scope.
    ///
    /// # Panics
    ///
    /// Panics if the composition was disposed.
    pub fn recompose(&self) {
        if self.disposed.get() {
            panic!("Composition::recompose() called after dispose()");
        }
        let mut owner = self.owner.borrow_mut();
        let tree = owner.tree_mut();
        tree.clear();
        let mut content = self.content.borrow_mut();
        self.observer
            .observe_reads(self.scope, Rc::clone(&self.on_changed), &mut || {
                (&mut *content)(&mut *tree);
            });
    }

    /// Tear down this content root, releasing its observation scope and
    /// the owner's tree.
    ///
    /// # Panics
    ///
    /// Panics on a second call.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            panic!("Composition::dispose() called twice");
        }
        self.observer.clear_scope(self.scope);
        // The owner itself may already be mid-teardown; only clear the
        // tree while the owner is still live.
        let mut owner = self.owner.borrow_mut();
        if !owner.is_disposed() {
            owner.tree_mut().clear();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LayoutNode;
    use prism_core::{InvalidationTracker, NoopSnapshotObserver, Rect};
    use std::sync::Arc;

    fn owner() -> Rc<RefCell<Owner>> {
        let mut owner = Owner::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        owner.initialize(Arc::new(InvalidationTracker::new(Arc::new(|| {}))));
        Rc::new(RefCell::new(owner))
    }

    fn composition(owner: Rc<RefCell<Owner>>, content: Content) -> Composition {
        Composition::new(owner, content, Rc::new(NoopSnapshotObserver), Rc::new(|| {}))
    }

    #[derive(Default)]
    struct RecordingObserver {
        observed: RefCell<Vec<ObservationScope>>,
        cleared: RefCell<Vec<ObservationScope>>,
    }

    impl SnapshotObserver for RecordingObserver {
        fn observe_reads(
            &self,
            scope: ObservationScope,
            _on_changed: Rc<dyn Fn()>,
            block: &mut dyn FnMut(),
        ) {
            self.observed.borrow_mut().push(scope);
            block();
        }

        fn flush_pending(&self) {}

        fn clear_scope(&self, scope: ObservationScope) {
            self.cleared.borrow_mut().push(scope);
        }
    }

    #[test]
    fn test_recompose_rebuilds_tree() {
        let owner = owner();
        let composition = composition(
            Rc::clone(&owner),
            Box::new(|tree| {
                tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
            }),
        );

        composition.recompose();
        assert_eq!(owner.borrow().tree().top_level().len(), 1);

        // Recompose replaces, never accumulates
        composition.recompose();
        assert_eq!(owner.borrow().tree().top_level().len(), 1);
    }

    #[test]
    fn test_recompose_observes_under_own_scope() {
        let observer = Rc::new(RecordingObserver::default());
        let owner = owner();
        let composition = Composition::new(
            Rc::clone(&owner),
            Box::new(|tree| {
                tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
            }),
            Rc::clone(&observer) as Rc<dyn SnapshotObserver>,
            Rc::new(|| {}),
        );

        composition.recompose();
        composition.recompose();
        // Both runs recorded under the same stable scope, and the block ran
        assert_eq!(
            *observer.observed.borrow(),
            vec![composition.scope(), composition.scope()]
        );
        assert_eq!(owner.borrow().tree().top_level().len(), 1);

        composition.dispose();
        assert_eq!(*observer.cleared.borrow(), vec![composition.scope()]);
    }

    #[test]
    #[should_panic(expected = "dispose() called twice")]
    fn test_double_dispose_panics() {
        let composition = composition(owner(), Box::new(|_| {}));
        composition.dispose();
        composition.dispose();
    }

    #[test]
    fn test_dispose_clears_tree() {
        let owner = owner();
        let composition = composition(
            Rc::clone(&owner),
            Box::new(|tree| {
                tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
            }),
        );
        composition.recompose();
        composition.dispose();
        assert!(owner.borrow().tree().is_empty());
    }
}
