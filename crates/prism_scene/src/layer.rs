//! Overlay layers
//!
//! A layer is an extra composition root stacked above the main content:
//! popups, dropdowns, dialogs, toasts. Each layer carries its own
//! [`Owner`], its own bounds within the scene, an optional scrim painted
//! behind it, and two interception hooks:
//!
//! - an outside-pointer callback, told about presses and releases that
//!   land outside the layer's bounds (dismiss-on-outside-click)
//! - a key interceptor, consulted before normal focus dispatch while the
//!   layer is the focused layer (dismiss-on-escape)
//!
//! [`SceneLayer`] is the user-facing handle; the scene keeps the shared
//! half alive in its stacking list until the handle is closed or the scene
//! is torn down.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use prism_core::{Color, KeyEvent, NoopSnapshotObserver, PointerEventKind, Rect};

use crate::content::{Composition, Content};
use crate::owner::{Constraints, Owner, OwnerId};
use crate::scene::SceneShared;

/// Callback for pointer activity outside the layer's bounds.
///
/// The second argument is true when the event should dismiss the layer: a
/// Release with no gesture in progress. Presses report false so a dismissal
/// decision can wait for the matching release.
pub type OutsidePointerCallback = Rc<dyn Fn(PointerEventKind, bool)>;

/// Pre-focus key hook for the focused layer; returns whether consumed
pub type KeyInterceptor = Rc<dyn Fn(&KeyEvent) -> bool>;

/// Scene-side half of a layer, shared between the scene's stacking list
/// and the user-facing handle
pub(crate) struct LayerShared {
    pub(crate) id: OwnerId,
    pub(crate) owner: Rc<RefCell<Owner>>,
    pub(crate) focusable: bool,
    pub(crate) bounds: Cell<Rect>,
    pub(crate) scrim: Cell<Option<Color>>,
    pub(crate) on_outside_pointer: RefCell<Option<OutsidePointerCallback>>,
    pub(crate) key_interceptor: RefCell<Option<KeyInterceptor>>,
    pub(crate) composition: RefCell<Option<Composition>>,
    pub(crate) closed: Cell<bool>,
}

impl LayerShared {
    pub(crate) fn new(owner: Rc<RefCell<Owner>>, focusable: bool, bounds: Rect) -> Self {
        let id = owner.borrow().id();
        Self {
            id,
            owner,
            focusable,
            bounds: Cell::new(bounds),
            scrim: Cell::new(None),
            on_outside_pointer: RefCell::new(None),
            key_interceptor: RefCell::new(None),
            composition: RefCell::new(None),
            closed: Cell::new(false),
        }
    }

    /// Tear down composition then owner. Idempotent at this level so the
    /// scene's close() can sweep layers whose handles were already closed.
    pub(crate) fn teardown(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(composition) = self.composition.borrow_mut().take() {
            composition.dispose();
        }
        self.owner.borrow_mut().dispose();
    }
}

/// User-facing handle to an attached overlay layer
pub struct SceneLayer {
    pub(crate) shared: Rc<LayerShared>,
    pub(crate) scene: Weak<SceneShared>,
}

impl SceneLayer {
    fn expect_open(&self, operation: &str) {
        if self.shared.closed.get() {
            panic!("SceneLayer::{operation} called after close()");
        }
    }

    pub fn id(&self) -> OwnerId {
        self.shared.id
    }

    pub fn is_focusable(&self) -> bool {
        self.shared.focusable
    }

    pub fn bounds(&self) -> Rect {
        self.shared.bounds.get()
    }

    /// Reposition the layer within the scene. Re-arms pointer-position
    /// resynthesis: what sits under a stationary cursor may have changed.
    pub fn set_bounds(&self, bounds: Rect) {
        self.expect_open("set_bounds");
        if self.shared.bounds.get() == bounds {
            return;
        }
        self.shared.bounds.set(bounds);
        {
            let mut owner = self.shared.owner.borrow_mut();
            owner.set_bounds(bounds);
            owner.set_constraints(Constraints::new(bounds.size));
        }
        if let Some(scene) = self.scene.upgrade() {
            scene.note_layer_geometry_changed();
        }
    }

    pub fn scrim(&self) -> Option<Color> {
        self.shared.scrim.get()
    }

    /// Scrim painted across the whole scene behind this layer, or `None`
    pub fn set_scrim(&self, scrim: Option<Color>) {
        self.expect_open("set_scrim");
        if self.shared.scrim.get() != scrim {
            self.shared.scrim.set(scrim);
            if let Some(scene) = self.scene.upgrade() {
                scene.request_draw();
            }
        }
    }

    pub fn set_outside_pointer_callback(&self, callback: Option<OutsidePointerCallback>) {
        self.expect_open("set_outside_pointer_callback");
        *self.shared.on_outside_pointer.borrow_mut() = callback;
    }

    pub fn set_key_interceptor(&self, interceptor: Option<KeyInterceptor>) {
        self.expect_open("set_key_interceptor");
        *self.shared.key_interceptor.borrow_mut() = interceptor;
    }

    /// Install (or replace) this layer's content root. The previous
    /// composition is disposed before the new one runs; the new one is
    /// observed so state writes schedule a recompose of this layer.
    pub fn set_content(&self, content: Content) {
        self.expect_open("set_content");
        if let Some(previous) = self.shared.composition.borrow_mut().take() {
            previous.dispose();
        }
        let composition = match self.scene.upgrade() {
            Some(scene) => scene.layer_composition(&self.shared, content),
            // Scene already gone: compose once, unobserved
            None => Composition::new(
                Rc::clone(&self.shared.owner),
                content,
                Rc::new(NoopSnapshotObserver),
                Rc::new(|| {}),
            ),
        };
        composition.recompose();
        *self.shared.composition.borrow_mut() = Some(composition);
        if let Some(scene) = self.scene.upgrade() {
            scene.note_layer_geometry_changed();
        }
    }

    /// Scoped access to this layer's owner (focus requests, tree queries)
    pub fn with_owner<R>(&self, f: impl FnOnce(&mut Owner) -> R) -> R {
        f(&mut *self.shared.owner.borrow_mut())
    }

    /// Detach from routing, dispose the composition, dispose the owner.
    ///
    /// # Panics
    ///
    /// Panics on a second call.
    pub fn close(&self) {
        if self.shared.closed.get() {
            panic!("SceneLayer::close() called twice");
        }
        tracing::debug!(layer = ?self.shared.id, "closing layer");
        // Detach first so no event routed during teardown can reach a
        // half-disposed owner.
        if let Some(scene) = self.scene.upgrade() {
            scene.detach_layer(self.shared.id);
        }
        self.shared.teardown();
    }
}
