//! Owner: one independent layout/render root
//!
//! A scene has one main owner; every attached layer carries another. Each
//! owner bundles a layout-node tree, a focus subsystem, and the per-root
//! state (density, layout direction, bounds, constraints, content size)
//! that measurement and routing read.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize()--> Initialized --dispose()--> Disposed
//! ```
//!
//! Lifecycle misuse (double initialize, double dispose, any operation after
//! dispose) is a caller bug that would corrupt routing state silently if
//! tolerated, so it panics immediately.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prism_core::{
    Canvas, Density, InvalidationTracker, KeyEvent, LayoutDirection, Point, PointerInputEvent,
    Rect, Size,
};
use smallvec::SmallVec;

use crate::focus::FocusManager;
use crate::node::{NodeTree, PointerHandler};

/// Identity of one owner, unique within the process.
///
/// The routing core compares gesture/hover/focus references by id, never by
/// concrete owner type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Measurement bounds for an owner's layout pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraints {
    pub max: Size,
}

impl Constraints {
    pub fn new(max: Size) -> Self {
        Self { max }
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max: Size::new(f32::INFINITY, f32::INFINITY),
        }
    }
}

/// Handle to this owner's semantics tree, consumed by accessibility bridges
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SemanticsHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Disposed,
}

/// A pointer dispatch resolved by hit-testing, ready to run.
///
/// Splitting resolution from invocation lets the scene release every borrow
/// before user handlers run, so a handler may re-enter the scene (open a
/// popup, close its own layer) without tripping over a live borrow.
pub struct PreparedPointerDispatch {
    handler: PointerHandler,
    event: PointerInputEvent,
}

impl PreparedPointerDispatch {
    pub fn run(self) {
        (self.handler)(&self.event);
    }
}

/// One independent layout/render root
pub struct Owner {
    id: OwnerId,
    lifecycle: Lifecycle,
    density: Density,
    layout_direction: LayoutDirection,
    /// Bounds in the parent (scene) coordinate space
    bounds: Rect,
    constraints: Constraints,
    /// Bounding box of top-level children after the last layout pass
    content_size: Size,
    tree: NodeTree,
    focus: FocusManager,
    semantics: SemanticsHandle,
    invalidations: Option<Arc<InvalidationTracker>>,
    /// Transient bookkeeping cleared by draw; the only state draw mutates
    needs_observation_cleanup: Cell<bool>,
}

impl Owner {
    pub fn new(bounds: Rect) -> Self {
        let id = OwnerId::next();
        Self {
            id,
            lifecycle: Lifecycle::Uninitialized,
            density: Density::default(),
            layout_direction: LayoutDirection::default(),
            bounds,
            constraints: Constraints::new(bounds.size),
            content_size: Size::ZERO,
            tree: NodeTree::new(),
            focus: FocusManager::new(),
            semantics: SemanticsHandle(id.0),
            invalidations: None,
            needs_observation_cleanup: Cell::new(false),
        }
    }

    /// Attach this owner to the scene's shared invalidation plumbing.
    ///
    /// # Panics
    ///
    /// Panics if called more than once, or on a disposed owner.
    pub fn initialize(&mut self, invalidations: Arc<InvalidationTracker>) {
        match self.lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Initialized => panic!("Owner::initialize() called twice"),
            Lifecycle::Disposed => panic!("Owner::initialize() called on a disposed owner"),
        }
        self.invalidations = Some(invalidations);
        self.lifecycle = Lifecycle::Initialized;
        tracing::debug!(owner = self.id.0, "owner initialized");
    }

    /// Detach and release the layout tree.
    ///
    /// # Panics
    ///
    /// Panics on a second call; disposed owners reject every other
    /// operation.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            panic!("Owner::dispose() called twice");
        }
        self.tree.clear();
        self.focus.release_focus();
        self.invalidations = None;
        self.lifecycle = Lifecycle::Disposed;
        tracing::debug!(owner = self.id.0, "owner disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }

    fn expect_live(&self, operation: &str) {
        match self.lifecycle {
            Lifecycle::Initialized => {}
            Lifecycle::Uninitialized => {
                panic!("Owner::{operation} called before initialize()")
            }
            Lifecycle::Disposed => panic!("Owner::{operation} called on a disposed owner"),
        }
    }

    // =========================================================================
    // Per-owner state
    // =========================================================================

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn density(&self) -> Density {
        self.density
    }

    pub fn set_density(&mut self, density: Density) {
        if self.density != density {
            self.density = density;
            self.request_layout();
        }
    }

    pub fn layout_direction(&self) -> LayoutDirection {
        self.layout_direction
    }

    pub fn set_layout_direction(&mut self, direction: LayoutDirection) {
        if self.layout_direction != direction {
            self.layout_direction = direction;
            self.request_layout();
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds != bounds {
            self.bounds = bounds;
            self.request_layout();
        }
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    pub fn set_constraints(&mut self, constraints: Constraints) {
        if self.constraints != constraints {
            self.constraints = constraints;
            self.tree.mark_needs_layout();
            self.request_layout();
        }
    }

    pub fn content_size(&self) -> Size {
        self.content_size
    }

    pub fn semantics(&self) -> SemanticsHandle {
        self.semantics
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    pub fn focus(&self) -> &FocusManager {
        &self.focus
    }

    pub fn focus_mut(&mut self) -> &mut FocusManager {
        &mut self.focus
    }

    /// Focus a node in this owner's tree, or clear with `None`; returns
    /// whether the request was accepted
    pub fn request_node_focus(&mut self, node: Option<crate::node::NodeKey>) -> bool {
        self.expect_live("request_node_focus");
        self.focus.request_focus(&self.tree, node)
    }

    fn request_layout(&self) {
        if let Some(invalidations) = &self.invalidations {
            invalidations.request_layout();
        }
    }

    // =========================================================================
    // Frame operations
    // =========================================================================

    /// Re-run pending measure/layout passes bounded by the current
    /// constraints. Safe to call when nothing is dirty (no-op).
    pub fn measure_and_layout(&mut self) {
        self.expect_live("measure_and_layout");
        if !self.tree.needs_layout() {
            return;
        }
        self.content_size = self.tree.resolve_layout(self.constraints.max);
        self.focus.prune(&self.tree);
        self.needs_observation_cleanup.set(true);
        tracing::trace!(
            owner = self.id.0,
            width = self.content_size.width,
            height = self.content_size.height,
            "owner laid out"
        );
    }

    /// Paint the tree. A pure read of layout results, except for clearing
    /// the transient observation-cleanup flag.
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        self.expect_live("draw");
        canvas.save();
        canvas.translate(self.bounds.x(), self.bounds.y());
        self.tree.draw(canvas);
        canvas.restore();
        self.needs_observation_cleanup.set(false);
    }

    /// Resolve a pointer batch against the tree without invoking the
    /// handler. Positions are translated into owner-local coordinates; the
    /// handler found deepest on the hit chain wins.
    pub fn prepare_pointer_dispatch(
        &self,
        event: &PointerInputEvent,
    ) -> Option<PreparedPointerDispatch> {
        self.expect_live("prepare_pointer_dispatch");
        let position = event.primary_position()?;
        let local = self.bounds.to_local(position);

        let mut cursor = self.tree.hit_test(local);
        let handler = loop {
            let key = cursor?;
            let node = self.tree.get(key)?;
            if let Some(handler) = &node.pointer_handler {
                break handler.clone();
            }
            cursor = node.parent();
        };

        let mut local_event = event.clone();
        let pointers: SmallVec<[prism_core::Pointer; 2]> = local_event
            .pointers
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.position = self.bounds.to_local(p.position);
                p
            })
            .collect();
        local_event.pointers = pointers;

        Some(PreparedPointerDispatch {
            handler,
            event: local_event,
        })
    }

    /// Hit-test and dispatch a pointer batch to the deepest interactive
    /// node. Prefer [`prepare_pointer_dispatch`](Self::prepare_pointer_dispatch)
    /// when the owner sits behind a shared cell.
    pub fn on_pointer_input(&self, event: &PointerInputEvent) {
        if let Some(prepared) = self.prepare_pointer_dispatch(event) {
            prepared.run();
        }
    }

    /// Dispatch a key event through the focus subsystem; returns consumed
    pub fn on_key_event(&self, event: &KeyEvent) -> bool {
        self.expect_live("on_key_event");
        self.focus.dispatch_key(&self.tree, event)
    }

    /// Whether `position` (scene coordinates) lands on a node owned by an
    /// embedded foreign view, which must receive the touch natively
    pub fn hit_test_interop_view(&self, position: Point) -> bool {
        self.expect_live("hit_test_interop_view");
        self.tree.hit_test_interop(self.bounds.to_local(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LayoutNode;
    use prism_core::{Modifiers, Pointer, PointerButtons, PointerEventKind};
    use smallvec::smallvec;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn initialized_owner(bounds: Rect) -> Owner {
        let mut owner = Owner::new(bounds);
        owner.initialize(Arc::new(InvalidationTracker::new(Arc::new(|| {}))));
        owner
    }

    fn move_event(position: Point) -> PointerInputEvent {
        PointerInputEvent {
            kind: PointerEventKind::Move,
            pointers: smallvec![Pointer::mouse(position, false)],
            buttons: PointerButtons::NONE,
            modifiers: Modifiers::default(),
            time_millis: 0,
            scroll_delta: None,
            changed_button: None,
        }
    }

    #[test]
    #[should_panic(expected = "initialize() called twice")]
    fn test_double_initialize_panics() {
        let mut owner = initialized_owner(Rect::new(0.0, 0.0, 100.0, 100.0));
        owner.initialize(Arc::new(InvalidationTracker::new(Arc::new(|| {}))));
    }

    #[test]
    #[should_panic(expected = "dispose() called twice")]
    fn test_double_dispose_panics() {
        let mut owner = initialized_owner(Rect::new(0.0, 0.0, 100.0, 100.0));
        owner.dispose();
        owner.dispose();
    }

    #[test]
    #[should_panic(expected = "disposed owner")]
    fn test_operation_after_dispose_panics() {
        let mut owner = initialized_owner(Rect::new(0.0, 0.0, 100.0, 100.0));
        owner.dispose();
        owner.measure_and_layout();
    }

    #[test]
    fn test_measure_is_noop_when_clean() {
        let mut owner = initialized_owner(Rect::new(0.0, 0.0, 200.0, 200.0));
        owner
            .tree_mut()
            .insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 50.0, 60.0)));
        owner.measure_and_layout();
        assert_eq!(owner.content_size(), Size::new(50.0, 60.0));

        // Second call with a clean tree must not recompute anything
        owner.measure_and_layout();
        assert_eq!(owner.content_size(), Size::new(50.0, 60.0));
    }

    #[test]
    fn test_pointer_dispatch_translates_to_local() {
        let mut owner = initialized_owner(Rect::new(100.0, 100.0, 200.0, 200.0));
        let seen: Rc<RefCell<Vec<Point>>> = Rc::new(RefCell::new(Vec::new()));

        let mut node = LayoutNode::with_rect(Rect::new(10.0, 10.0, 50.0, 50.0));
        let log = Rc::clone(&seen);
        node.pointer_handler = Some(Rc::new(move |event| {
            log.borrow_mut().push(event.primary_position().unwrap());
        }));
        owner.tree_mut().insert(None, node);
        owner.measure_and_layout();

        // Scene position 130,130 = owner-local 30,30, inside the node
        owner.on_pointer_input(&move_event(Point::new(130.0, 130.0)));
        assert_eq!(*seen.borrow(), vec![Point::new(30.0, 30.0)]);

        // Outside the node: no dispatch
        owner.on_pointer_input(&move_event(Point::new(290.0, 290.0)));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_pointer_dispatch_bubbles_to_handler() {
        let mut owner = initialized_owner(Rect::new(0.0, 0.0, 100.0, 100.0));
        let hits = Rc::new(RefCell::new(0u32));

        let mut parent = LayoutNode::with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        let count = Rc::clone(&hits);
        parent.pointer_handler = Some(Rc::new(move |_| *count.borrow_mut() += 1));
        let parent = owner.tree_mut().insert(None, parent);
        // Child with no handler; the hit should bubble to the parent
        owner.tree_mut().insert(
            Some(parent),
            LayoutNode::with_rect(Rect::new(20.0, 20.0, 30.0, 30.0)),
        );
        owner.measure_and_layout();

        owner.on_pointer_input(&move_event(Point::new(25.0, 25.0)));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_set_constraints_requests_layout() {
        let requests = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let count = Arc::clone(&requests);
        let tracker = Arc::new(InvalidationTracker::new(Arc::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })));

        let mut owner = Owner::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        owner.initialize(tracker);
        owner.set_constraints(Constraints::new(Size::new(50.0, 50.0)));
        assert!(requests.load(Ordering::SeqCst) > 0);
    }
}
