//! Scene: owner stacking, input routing, and the frame pipeline
//!
//! A scene hosts one main owner plus a stack of overlay layers and decides,
//! per event, which owner the event belongs to:
//!
//! ```text
//!           ┌─────────────────────────────┐
//!  events → │ InputHandler                │
//!           │   ↓ routing                 │   stacking (bottom → top)
//!           │ SceneShared ────────────────┼──  main owner
//!           │   gesture / hover / focus   │    layer 1
//!           │   references (by OwnerId)   │    layer 2  ← scanned first
//!           └─────────────────────────────┘
//! ```
//!
//! Routing policy:
//!
//! - **Press** scans owners topmost-first. Layers skipped on the way down
//!   get an outside-pointer notification; the scan never descends below the
//!   focused layer, which is what makes a focusable layer modal. The owner
//!   that takes the press becomes the gesture owner.
//! - **Release** always goes to the gesture owner, even if the pointer
//!   drifted elsewhere. Once no pointer is down the gesture ends and hover
//!   is recomputed at the release point.
//! - **Move** goes to the gesture owner while a gesture is in progress,
//!   otherwise to the topmost interactive owner under the pointer. Mouse
//!   moves synthesize Enter/Exit when the hovered owner changes, and the
//!   Move itself is suppressed on that transition frame.
//! - **Scroll** goes to the owner under the pointer only if interactive.
//!
//! An owner is *interactive* when no layer holds focus, or it is the
//! focused layer, or it is stacked above the focused layer.
//!
//! User handlers may re-enter the scene (close their own layer, open a
//! popup). Routing therefore resolves targets against an owner snapshot
//! copied into a pooled buffer, and releases every borrow before any
//! handler runs.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use prism_core::{
    Canvas, Density, FrameClock, FrameRecomposer, InvalidateCallback, InvalidationTracker,
    KeyEvent, LayoutDirection, NoopSnapshotObserver, Phase, Point, PointerDevice,
    PointerEventKind, PointerInputEvent, Rect, Size, SnapshotObserver,
};
use prism_platform::{PlatformContext, PlatformError, PointerIcon};

use crate::content::{Composition, Content};
use crate::error::{Result, SceneError};
use crate::input::InputHandler;
use crate::layer::{LayerShared, SceneLayer};
use crate::owner::{Constraints, Owner, OwnerId};

/// One entry of the copied routing snapshot
#[derive(Clone)]
struct OwnerSnapshot {
    id: OwnerId,
    owner: Rc<RefCell<Owner>>,
    /// Bounds in scene coordinates at snapshot time
    bounds: Rect,
    /// `None` for the main owner
    layer: Option<Rc<LayerShared>>,
}

/// Routing references and the layer stack, guarded by one `RefCell`
struct SceneState {
    /// Attachment order; later entries are stacked above earlier ones
    layers: Vec<Rc<LayerShared>>,
    /// Topmost focusable layer, if any; gates interactivity below it
    focused_layer: Option<OwnerId>,
    /// Owner pinned by the last press until no pointer is down
    gesture_owner: Option<OwnerId>,
    /// Owner the mouse currently hovers (mouse only)
    hover_owner: Option<OwnerId>,
    /// Whether the hosting window holds keyboard focus
    scene_focused: bool,
    closed: bool,
}

/// Shared half of a scene, owned jointly by the public handle, layer
/// handles, and the input callbacks
pub(crate) struct SceneShared {
    main: Rc<RefCell<Owner>>,
    main_id: OwnerId,
    main_composition: RefCell<Option<Composition>>,
    state: RefCell<SceneState>,
    input: InputHandler,
    recomposer: FrameRecomposer,
    frame_clock: FrameClock,
    invalidations: Arc<InvalidationTracker>,
    snapshot_observer: Rc<dyn SnapshotObserver>,
    platform: Rc<dyn PlatformContext>,
    /// Opaque composition-local context forwarded between host and content
    composition_context: RefCell<Option<Rc<dyn Any>>>,
    last_frame_nanos: Cell<u64>,
    /// Pooled routing-snapshot buffer; taken while iterating, returned
    /// cleared. Nested iterations fall back to a fresh allocation.
    scratch: RefCell<Vec<OwnerSnapshot>>,
}

fn topmost_hit(snapshot: &[OwnerSnapshot], position: Point) -> Option<OwnerSnapshot> {
    snapshot
        .iter()
        .rev()
        .find(|entry| entry.bounds.contains(position))
        .cloned()
}

/// Interactivity rule: with a focused layer, only that layer and owners
/// stacked above it may receive pointer input
fn is_interactive(snapshot: &[OwnerSnapshot], focused_layer: Option<OwnerId>, id: OwnerId) -> bool {
    let Some(focused) = focused_layer else {
        return true;
    };
    let Some(focused_index) = snapshot.iter().position(|entry| entry.id == focused) else {
        return true;
    };
    match snapshot.iter().position(|entry| entry.id == id) {
        Some(index) => index >= focused_index,
        None => false,
    }
}

/// Capability probe run once per scene construction: a host that cannot
/// report a usable window is not embeddable
fn probe_platform(platform: &dyn PlatformContext) -> Result<()> {
    let bounds = platform.window_bounds();
    if bounds.size.is_empty() {
        return Err(SceneError::Platform(PlatformError::Unavailable(
            "host reported an empty window".into(),
        )));
    }
    Ok(())
}

fn notify_outside(layer: &LayerShared, kind: PointerEventKind, dismiss: bool) {
    let callback = layer.on_outside_pointer.borrow().clone();
    if let Some(callback) = callback {
        callback(kind, dismiss);
    }
}

impl SceneShared {
    fn new(
        platform: Rc<dyn PlatformContext>,
        invalidate: InvalidateCallback,
        snapshot_observer: Rc<dyn SnapshotObserver>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<SceneShared>| {
            let pointer_weak = weak.clone();
            let key_weak = weak.clone();
            let input = InputHandler::new(
                Rc::new(move |event| {
                    if let Some(scene) = pointer_weak.upgrade() {
                        scene.route_pointer_event(event);
                    }
                }),
                Rc::new(move |event| {
                    key_weak
                        .upgrade()
                        .map(|scene| scene.route_key_event(event))
                        .unwrap_or(false)
                }),
            );

            let invalidations = Arc::new(InvalidationTracker::new(invalidate));
            let bounds = platform.window_bounds();
            let mut main = Owner::new(bounds);
            main.initialize(Arc::clone(&invalidations));
            main.set_density(platform.density());
            main.set_layout_direction(platform.layout_direction());
            // The scene starts focused; the host corrects via set_focused
            main.focus_mut().take_focus();
            let main_id = main.id();

            SceneShared {
                main: Rc::new(RefCell::new(main)),
                main_id,
                main_composition: RefCell::new(None),
                state: RefCell::new(SceneState {
                    layers: Vec::new(),
                    focused_layer: None,
                    gesture_owner: None,
                    hover_owner: None,
                    scene_focused: true,
                    closed: false,
                }),
                input,
                recomposer: FrameRecomposer::new(),
                frame_clock: FrameClock::new(),
                invalidations,
                snapshot_observer,
                platform,
                composition_context: RefCell::new(None),
                last_frame_nanos: Cell::new(0),
                scratch: RefCell::new(Vec::new()),
            }
        })
    }

    fn expect_open(&self, operation: &str) {
        if self.state.borrow().closed {
            panic!("Scene::{operation} called after close()");
        }
    }

    // =========================================================================
    // Owner snapshots
    // =========================================================================

    /// Copy the owner stack (bottom to top) into a pooled buffer, so
    /// iteration survives handlers mutating the stack mid-dispatch
    fn snapshot_owners(&self) -> Vec<OwnerSnapshot> {
        let mut buffer = std::mem::take(&mut *self.scratch.borrow_mut());
        buffer.clear();
        buffer.push(OwnerSnapshot {
            id: self.main_id,
            owner: Rc::clone(&self.main),
            bounds: self.main.borrow().bounds(),
            layer: None,
        });
        let state = self.state.borrow();
        for layer in &state.layers {
            buffer.push(OwnerSnapshot {
                id: layer.id,
                owner: Rc::clone(&layer.owner),
                bounds: layer.bounds.get(),
                layer: Some(Rc::clone(layer)),
            });
        }
        buffer
    }

    fn recycle(&self, mut buffer: Vec<OwnerSnapshot>) {
        buffer.clear();
        let mut slot = self.scratch.borrow_mut();
        if slot.capacity() < buffer.capacity() {
            *slot = buffer;
        }
    }

    // =========================================================================
    // Pointer routing
    // =========================================================================

    fn route_pointer_event(&self, event: &PointerInputEvent) {
        if self.state.borrow().closed {
            return;
        }
        match event.kind {
            PointerEventKind::Press => self.route_press(event),
            PointerEventKind::Release => self.route_release(event),
            PointerEventKind::Move | PointerEventKind::Enter | PointerEventKind::Exit => {
                self.route_move(event)
            }
            PointerEventKind::Scroll => self.route_scroll(event),
        }
        // The gesture ends as soon as the batch reports nothing down
        if !event.any_pressed() {
            self.state.borrow_mut().gesture_owner = None;
        }
    }

    /// Resolve hit-testing against the snapshot entry, then run the handler
    /// with no borrow held
    fn dispatch_to(&self, entry: &OwnerSnapshot, event: &PointerInputEvent) {
        let prepared = {
            let owner = entry.owner.borrow();
            if owner.is_disposed() {
                None
            } else {
                owner.prepare_pointer_dispatch(event)
            }
        };
        if let Some(prepared) = prepared {
            prepared.run();
        }
    }

    fn route_press(&self, event: &PointerInputEvent) {
        let Some(position) = event.primary_position() else {
            return;
        };
        let snapshot = self.snapshot_owners();
        let (focused_layer, gesture_owner) = {
            let state = self.state.borrow();
            (state.focused_layer, state.gesture_owner)
        };

        // A second contact while a gesture is in progress stays pinned
        if let Some(gesture) = gesture_owner {
            let entry = snapshot.iter().find(|entry| entry.id == gesture).cloned();
            self.recycle(snapshot);
            if let Some(entry) = entry {
                self.dispatch_to(&entry, event);
            }
            return;
        }

        // Topmost-first scan. Layers skipped before a target is found are
        // notified the press landed outside them; the scan never descends
        // below the focused layer, so nothing under a modal layer can take
        // a press. A focused layer sitting below the target is still told
        // about the outside press (it may be waiting to dismiss).
        let mut target: Option<OwnerSnapshot> = None;
        let mut outside: Vec<Rc<LayerShared>> = Vec::new();
        for entry in snapshot.iter().rev() {
            let contains = entry.bounds.contains(position);
            if contains && target.is_none() {
                target = Some(entry.clone());
            } else if !contains {
                if let Some(layer) = &entry.layer {
                    if target.is_none() || Some(entry.id) == focused_layer {
                        outside.push(Rc::clone(layer));
                    }
                }
            }
            if Some(entry.id) == focused_layer {
                break;
            }
        }
        self.recycle(snapshot);

        if let Some(entry) = &target {
            self.state.borrow_mut().gesture_owner = Some(entry.id);
            tracing::trace!(owner = ?entry.id, "gesture started");
        }
        // A press never dismisses by itself; dismissal waits for the
        // matching release.
        for layer in outside {
            notify_outside(&layer, PointerEventKind::Press, false);
        }
        if let Some(entry) = target {
            self.dispatch_to(&entry, event);
        }
    }

    fn route_release(&self, event: &PointerInputEvent) {
        let snapshot = self.snapshot_owners();
        let gesture_owner = self.state.borrow().gesture_owner;

        // The gesture owner sees the release wherever the pointer drifted
        if let Some(gesture) = gesture_owner {
            if let Some(entry) = snapshot.iter().find(|entry| entry.id == gesture).cloned() {
                self.dispatch_to(&entry, event);
            }
        }

        if !event.any_pressed() {
            // Re-read: the release handler may have changed the stack
            let focused_layer = self.state.borrow().focused_layer;
            let target = event
                .primary_position()
                .and_then(|position| topmost_hit(&snapshot, position));
            match target {
                Some(entry) if is_interactive(&snapshot, focused_layer, entry.id) => {
                    self.process_hover(event, Some(&entry), &snapshot);
                }
                _ => {
                    // Released outside every interactive owner: with no
                    // gesture to finish, the focused layer may dismiss.
                    if gesture_owner.is_none() {
                        let focused = focused_layer.and_then(|id| {
                            snapshot
                                .iter()
                                .find(|entry| entry.id == id)
                                .and_then(|entry| entry.layer.clone())
                        });
                        if let Some(layer) = focused {
                            notify_outside(&layer, PointerEventKind::Release, true);
                        }
                    }
                }
            }
        }
        self.recycle(snapshot);
    }

    fn route_move(&self, event: &PointerInputEvent) {
        let snapshot = self.snapshot_owners();
        let (focused_layer, gesture_owner) = {
            let state = self.state.borrow();
            (state.focused_layer, state.gesture_owner)
        };

        let target = if let Some(gesture) = gesture_owner {
            snapshot.iter().find(|entry| entry.id == gesture).cloned()
        } else if event.kind == PointerEventKind::Exit {
            // Pointer left the window: nothing is hovered anymore
            None
        } else {
            event
                .primary_position()
                .and_then(|position| topmost_hit(&snapshot, position))
                .filter(|entry| is_interactive(&snapshot, focused_layer, entry.id))
        };

        let transitioned = self.process_hover(event, target.as_ref(), &snapshot);
        // The Move is suppressed on a transition frame; the Enter already
        // carried this batch's positions.
        if !transitioned {
            if let Some(entry) = &target {
                if event.kind != PointerEventKind::Exit {
                    self.dispatch_to(entry, event);
                }
            }
        }
        self.recycle(snapshot);
    }

    /// Mouse-only Enter/Exit synthesis. Returns true when the hovered owner
    /// changed, i.e. synthetic events were dispatched for this batch.
    fn process_hover(
        &self,
        event: &PointerInputEvent,
        target: Option<&OwnerSnapshot>,
        snapshot: &[OwnerSnapshot],
    ) -> bool {
        if event.device() != PointerDevice::Mouse {
            return false;
        }
        let target_id = target.map(|entry| entry.id);
        let previous = {
            let mut state = self.state.borrow_mut();
            if state.hover_owner == target_id {
                return false;
            }
            // Updated before dispatch: an Enter handler observing hover
            // state must see the new owner.
            std::mem::replace(&mut state.hover_owner, target_id)
        };
        if let Some(entry) = previous.and_then(|id| snapshot.iter().find(|e| e.id == id)) {
            self.dispatch_to(entry, &event.with_kind(PointerEventKind::Exit));
        }
        if let Some(entry) = target {
            self.dispatch_to(entry, &event.with_kind(PointerEventKind::Enter));
        }
        true
    }

    fn route_scroll(&self, event: &PointerInputEvent) {
        let snapshot = self.snapshot_owners();
        let focused_layer = self.state.borrow().focused_layer;
        if let Some(position) = event.primary_position() {
            if let Some(entry) = topmost_hit(&snapshot, position) {
                if is_interactive(&snapshot, focused_layer, entry.id) {
                    self.dispatch_to(&entry, event);
                }
            }
        }
        self.recycle(snapshot);
    }

    // =========================================================================
    // Key routing
    // =========================================================================

    fn route_key_event(&self, event: &KeyEvent) -> bool {
        // The focused layer's interceptor sees the event before any focus
        // dispatch (dismiss-on-escape for dialogs)
        let (interceptor, owner) = {
            let state = self.state.borrow();
            if state.closed {
                return false;
            }
            match state
                .focused_layer
                .and_then(|id| state.layers.iter().find(|layer| layer.id == id))
            {
                Some(layer) => (
                    layer.key_interceptor.borrow().clone(),
                    Rc::clone(&layer.owner),
                ),
                None => (None, Rc::clone(&self.main)),
            }
        };
        if let Some(interceptor) = interceptor {
            if interceptor(event) {
                return true;
            }
        }
        // Collect the dispatch chain under the borrow; run handlers outside
        let chain = {
            let owner = owner.borrow();
            if owner.is_disposed() || !owner.focus().has_focus() {
                Vec::new()
            } else {
                owner.focus().key_dispatch_chain(owner.tree())
            }
        };
        for handler in chain {
            if handler(event) {
                return true;
            }
        }
        false
    }

    // =========================================================================
    // Layer stack
    // =========================================================================

    fn focus_owner(&self, state: &SceneState) -> Rc<RefCell<Owner>> {
        state
            .focused_layer
            .and_then(|id| state.layers.iter().find(|layer| layer.id == id))
            .map(|layer| Rc::clone(&layer.owner))
            .unwrap_or_else(|| Rc::clone(&self.main))
    }

    fn attach_layer(&self, layer: Rc<LayerShared>) {
        let (previous, next, scene_focused) = {
            let mut state = self.state.borrow_mut();
            let previous = layer.focusable.then(|| self.focus_owner(&state));
            state.layers.push(Rc::clone(&layer));
            if layer.focusable {
                state.focused_layer = Some(layer.id);
            }
            let next = layer.focusable.then(|| Rc::clone(&layer.owner));
            (previous, next, state.scene_focused)
        };
        if let (Some(previous), Some(next)) = (previous, next) {
            previous.borrow_mut().focus_mut().release_focus();
            if scene_focused {
                next.borrow_mut().focus_mut().take_focus();
            }
        }
        // What sits under a stationary cursor changed
        self.input.on_pointer_update();
        self.invalidations.request_layout();
        tracing::debug!(layer = ?layer.id, focusable = layer.focusable, "layer attached");
    }

    pub(crate) fn detach_layer(&self, id: OwnerId) {
        let focus_change = {
            let mut state = self.state.borrow_mut();
            let before = state.layers.len();
            state.layers.retain(|layer| layer.id != id);
            if state.layers.len() == before {
                // Already detached (scene close swept it)
                return;
            }
            if state.hover_owner == Some(id) {
                state.hover_owner = None;
            }
            if state.gesture_owner == Some(id) {
                state.gesture_owner = None;
            }
            if state.focused_layer == Some(id) {
                // Focus falls to the topmost remaining focusable layer,
                // else back to the main owner
                state.focused_layer = state
                    .layers
                    .iter()
                    .rev()
                    .find(|layer| layer.focusable)
                    .map(|layer| layer.id);
                Some((self.focus_owner(&state), state.scene_focused))
            } else {
                None
            }
        };
        if let Some((next, scene_focused)) = focus_change {
            if scene_focused {
                next.borrow_mut().focus_mut().take_focus();
            }
        }
        self.input.on_pointer_update();
        self.invalidations.request_layout();
        self.invalidations.request_draw();
        tracing::debug!(layer = ?id, "layer detached");
    }

    pub(crate) fn create_layer(self: &Rc<Self>, focusable: bool, bounds: Rect) -> SceneLayer {
        self.expect_open("create_layer");
        let mut owner = Owner::new(bounds);
        owner.initialize(Arc::clone(&self.invalidations));
        owner.set_density(self.platform.density());
        owner.set_layout_direction(self.platform.layout_direction());
        let shared = Rc::new(LayerShared::new(
            Rc::new(RefCell::new(owner)),
            focusable,
            bounds,
        ));
        self.attach_layer(Rc::clone(&shared));
        SceneLayer {
            shared,
            scene: Rc::downgrade(self),
        }
    }

    pub(crate) fn note_layer_geometry_changed(&self) {
        self.input.on_pointer_update();
        self.invalidations.request_layout();
    }

    pub(crate) fn request_draw(&self) {
        self.invalidations.request_draw();
    }

    // =========================================================================
    // Frame pipeline
    // =========================================================================

    /// Bring composition and layout up to date, in pipeline order: flush
    /// recompositions, tick the frame clock (flushing again so work
    /// scheduled by frame callbacks lands this frame), re-run layout,
    /// resync pointer positions against the new geometry.
    fn prepare_frame(&self, frame_time_nanos: u64) -> Vec<OwnerSnapshot> {
        self.last_frame_nanos.set(frame_time_nanos);
        self.snapshot_observer.flush_pending();
        self.recomposer.flush();
        self.frame_clock.advance(frame_time_nanos);
        self.recomposer.flush();
        self.invalidations.on_layout();
        let owners = self.snapshot_owners();
        for entry in &owners {
            let mut owner = entry.owner.borrow_mut();
            if !owner.is_disposed() {
                owner.measure_and_layout();
            }
        }
        self.input.on_layout();
        owners
    }

    pub(crate) fn render(&self, canvas: &mut dyn Canvas, frame_time_nanos: u64) {
        self.expect_open("render");
        let owners = self.prepare_frame(frame_time_nanos);
        self.invalidations.on_draw();
        let scene_bounds = self.main.borrow().bounds();
        // Back to front; a layer's scrim dims everything painted below it
        for entry in &owners {
            if let Some(layer) = &entry.layer {
                if let Some(scrim) = layer.scrim.get() {
                    canvas.fill_rect(scene_bounds, scrim);
                }
            }
            let owner = entry.owner.borrow();
            if !owner.is_disposed() {
                owner.draw(canvas);
            }
        }
        self.recycle(owners);
    }

    pub(crate) fn send_pointer_event(&self, event: PointerInputEvent) {
        self.expect_open("send_pointer_event");
        let owners = self.prepare_frame(event.time_millis.saturating_mul(1_000_000));
        self.recycle(owners);
        self.input.on_pointer_event(&event);
    }

    /// Default-argument form: a mouse batch built from tracked
    /// button/modifier state
    pub(crate) fn send_pointer(&self, kind: PointerEventKind, position: Point, time_millis: u64) {
        self.expect_open("send_pointer_event");
        let owners = self.prepare_frame(time_millis.saturating_mul(1_000_000));
        self.recycle(owners);
        let event = self.input.default_mouse_event(kind, position, time_millis);
        self.input.on_pointer_event(&event);
    }

    pub(crate) fn send_key_event(&self, event: KeyEvent) -> bool {
        self.expect_open("send_key_event");
        let owners = self.prepare_frame(self.last_frame_nanos.get());
        self.recycle(owners);
        self.input.on_key_event(&event)
    }

    // =========================================================================
    // Content and scene-wide state
    // =========================================================================

    pub(crate) fn set_content(self: &Rc<Self>, content: Content) {
        self.expect_open("set_content");
        if let Some(previous) = self.main_composition.borrow_mut().take() {
            previous.dispose();
        }
        // Stale hover/position assumptions never carry across content roots
        self.input.on_change_content();
        self.state.borrow_mut().hover_owner = None;
        // A write to state the content read schedules the next recompose
        let weak = Rc::downgrade(self);
        let on_changed: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(scene) = weak.upgrade() {
                if !scene.state.borrow().closed {
                    scene.request_recompose();
                }
            }
        });
        let composition = Composition::new(
            Rc::clone(&self.main),
            content,
            Rc::clone(&self.snapshot_observer),
            on_changed,
        );
        composition.recompose();
        *self.main_composition.borrow_mut() = Some(composition);
        self.invalidations.request_layout();
    }

    /// Build a layer's composition, observed so that state writes schedule
    /// a recompose of that layer
    pub(crate) fn layer_composition(
        self: &Rc<Self>,
        layer: &Rc<LayerShared>,
        content: Content,
    ) -> Composition {
        let weak_scene = Rc::downgrade(self);
        let weak_layer = Rc::downgrade(layer);
        let on_changed: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(scene) = weak_scene.upgrade() {
                if let Some(layer) = weak_layer.upgrade() {
                    scene.request_layer_recompose(&layer);
                }
            }
        });
        Composition::new(
            Rc::clone(&layer.owner),
            content,
            Rc::clone(&self.snapshot_observer),
            on_changed,
        )
    }

    /// Schedule a re-run of one layer's content for the next flush
    fn request_layer_recompose(self: &Rc<Self>, layer: &Rc<LayerShared>) {
        if self.state.borrow().closed || layer.closed.get() {
            return;
        }
        let weak = Rc::downgrade(layer);
        self.recomposer.schedule(
            Phase::Recompose,
            Box::new(move || {
                let Some(layer) = weak.upgrade() else { return };
                if layer.closed.get() {
                    return;
                }
                // Taken out of the slot while the content closure runs, so
                // the closure may install a replacement root
                let Some(composition) = layer.composition.borrow_mut().take() else {
                    return;
                };
                composition.recompose();
                let mut slot = layer.composition.borrow_mut();
                if slot.is_none() {
                    *slot = Some(composition);
                } else {
                    drop(slot);
                    composition.dispose();
                }
            }),
        );
        self.invalidations.request_layout();
    }

    /// Schedule a re-run of the main content for the next flush
    pub(crate) fn request_recompose(self: &Rc<Self>) {
        self.expect_open("request_recompose");
        let weak = Rc::downgrade(self);
        self.recomposer.schedule(
            Phase::Recompose,
            Box::new(move || {
                let Some(scene) = weak.upgrade() else { return };
                if scene.state.borrow().closed {
                    return;
                }
                // Taken out of the slot while the content closure runs, so
                // the closure may install a replacement root
                let Some(composition) = scene.main_composition.borrow_mut().take() else {
                    return;
                };
                composition.recompose();
                let mut slot = scene.main_composition.borrow_mut();
                if slot.is_none() {
                    *slot = Some(composition);
                    drop(slot);
                } else {
                    drop(slot);
                    composition.dispose();
                }
                scene.invalidations.request_layout();
            }),
        );
        self.invalidations.request_layout();
    }

    pub(crate) fn set_scene_focused(&self, focused: bool) {
        self.expect_open("set_focused");
        let owner = {
            let mut state = self.state.borrow_mut();
            if state.scene_focused == focused {
                return;
            }
            state.scene_focused = focused;
            self.focus_owner(&state)
        };
        let mut owner = owner.borrow_mut();
        if focused {
            owner.focus_mut().take_focus();
        } else {
            owner.focus_mut().release_focus();
        }
    }

    pub(crate) fn set_density(&self, density: Density) {
        self.expect_open("set_density");
        let owners = self.snapshot_owners();
        for entry in &owners {
            let mut owner = entry.owner.borrow_mut();
            if !owner.is_disposed() {
                owner.set_density(density);
            }
        }
        self.recycle(owners);
    }

    pub(crate) fn set_layout_direction(&self, direction: LayoutDirection) {
        self.expect_open("set_layout_direction");
        let owners = self.snapshot_owners();
        for entry in &owners {
            let mut owner = entry.owner.borrow_mut();
            if !owner.is_disposed() {
                owner.set_layout_direction(direction);
            }
        }
        self.recycle(owners);
    }

    pub(crate) fn set_bounds(&self, bounds: Rect) {
        self.expect_open("set_bounds");
        {
            let mut main = self.main.borrow_mut();
            main.set_bounds(bounds);
            main.set_constraints(Constraints::new(bounds.size));
        }
        self.input.on_pointer_update();
    }

    /// Whether `position` lands on an embedded foreign view of the topmost
    /// interactive owner under it, which must take the touch natively
    pub(crate) fn hit_test_interop_view(&self, position: Point) -> bool {
        let snapshot = self.snapshot_owners();
        let focused_layer = self.state.borrow().focused_layer;
        let result = topmost_hit(&snapshot, position)
            .filter(|entry| is_interactive(&snapshot, focused_layer, entry.id))
            .map(|entry| {
                let owner = entry.owner.borrow();
                !owner.is_disposed() && owner.hit_test_interop_view(position)
            })
            .unwrap_or(false);
        self.recycle(snapshot);
        result
    }

    pub(crate) fn close(&self) {
        let layers = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                panic!("Scene::close() called twice");
            }
            state.closed = true;
            state.focused_layer = None;
            state.gesture_owner = None;
            state.hover_owner = None;
            std::mem::take(&mut state.layers)
        };
        // Topmost first, mirroring reverse attachment order
        for layer in layers.iter().rev() {
            layer.teardown();
        }
        if let Some(composition) = self.main_composition.borrow_mut().take() {
            composition.dispose();
        }
        self.main.borrow_mut().dispose();
        tracing::debug!("scene closed");
    }
}

// ============================================================================
// Public scene handles
// ============================================================================

macro_rules! scene_common_api {
    () => {
        /// Install (or replace) the main content root
        pub fn set_content(&self, content: Content) {
            self.shared.set_content(content);
        }

        /// Schedule a re-run of the main content for the next frame
        pub fn request_recompose(&self) {
            self.shared.request_recompose();
        }

        /// Feed a canonical pointer batch through the routing core.
        /// Composition and layout are brought up to date first.
        pub fn send_pointer_event(&self, event: PointerInputEvent) {
            self.shared.send_pointer_event(event);
        }

        /// Convenience mouse form; buttons and modifiers come from tracked
        /// input state
        pub fn send_pointer(&self, kind: PointerEventKind, position: Point, time_millis: u64) {
            self.shared.send_pointer(kind, position, time_millis);
        }

        /// Dispatch a key event; returns whether it was consumed
        pub fn send_key_event(&self, event: KeyEvent) -> bool {
            self.shared.send_key_event(event)
        }

        /// Run one frame: flush composition work, tick the frame clock,
        /// layout, then paint all owners back to front
        pub fn render(&self, canvas: &mut dyn Canvas, frame_time_nanos: u64) {
            self.shared.render(canvas, frame_time_nanos);
        }

        /// Host window focus changed
        pub fn set_focused(&self, focused: bool) {
            self.shared.set_scene_focused(focused);
        }

        pub fn set_density(&self, density: Density) {
            self.shared.set_density(density);
        }

        pub fn set_layout_direction(&self, direction: LayoutDirection) {
            self.shared.set_layout_direction(direction);
        }

        /// Resize the scene (main owner bounds and constraints)
        pub fn set_bounds(&self, bounds: Rect) {
            self.shared.set_bounds(bounds);
        }

        pub fn bounds(&self) -> Rect {
            self.shared.main.borrow().bounds()
        }

        /// Content size measured on the last layout pass of the main owner
        pub fn content_size(&self) -> Size {
            self.shared.main.borrow().content_size()
        }

        /// Whether a native interop view sits under `position` and must
        /// receive the touch directly
        pub fn hit_test_interop_view(&self, position: Point) -> bool {
            self.shared.hit_test_interop_view(position)
        }

        /// Last-known mouse position inside the scene
        pub fn cursor_position(&self) -> Option<Point> {
            self.shared.input.cursor_position()
        }

        /// Forward a pointer-icon request from hovered content to the host
        pub fn set_pointer_icon(&self, icon: PointerIcon) {
            self.shared.expect_open("set_pointer_icon");
            self.shared.platform.set_pointer_icon(icon);
        }

        /// Opaque composition-local context handed through to content
        pub fn set_composition_context(&self, context: Option<Rc<dyn Any>>) {
            self.shared.expect_open("set_composition_context");
            *self.shared.composition_context.borrow_mut() = context;
        }

        pub fn composition_context(&self) -> Option<Rc<dyn Any>> {
            self.shared.composition_context.borrow().clone()
        }

        /// True while any composition, frame-clock, or invalidation work is
        /// outstanding
        pub fn has_pending_work(&self) -> bool {
            self.shared.recomposer.has_pending_work()
                || self.shared.frame_clock.has_awaiters()
                || self.shared.invalidations.has_invalidations()
        }

        /// Handle for scheduling composition tasks onto this scene
        pub fn recomposer(&self) -> FrameRecomposer {
            self.shared.recomposer.clone()
        }

        /// Handle for one-shot frame callbacks (animations)
        pub fn frame_clock(&self) -> FrameClock {
            self.shared.frame_clock.clone()
        }

        /// Scoped access to the main owner (focus requests, tree queries)
        pub fn with_main_owner<R>(&self, f: impl FnOnce(&mut Owner) -> R) -> R {
            f(&mut *self.shared.main.borrow_mut())
        }

        /// Tear the scene down: close remaining layers topmost-first, then
        /// dispose the main composition and owner.
        ///
        /// # Panics
        ///
        /// Panics on a second call.
        pub fn close(&self) {
            self.shared.close();
        }
    };
}

/// Scene hosting a main owner plus a stack of overlay layers
pub struct MultiLayerScene {
    shared: Rc<SceneShared>,
}

impl MultiLayerScene {
    pub fn new(
        platform: Rc<dyn PlatformContext>,
        invalidate: InvalidateCallback,
    ) -> Result<Self> {
        Self::with_snapshot_observer(platform, invalidate, Rc::new(NoopSnapshotObserver))
    }

    pub fn with_snapshot_observer(
        platform: Rc<dyn PlatformContext>,
        invalidate: InvalidateCallback,
        snapshot_observer: Rc<dyn SnapshotObserver>,
    ) -> Result<Self> {
        probe_platform(platform.as_ref())?;
        Ok(Self {
            shared: SceneShared::new(platform, invalidate, snapshot_observer),
        })
    }

    scene_common_api!();

    /// Attach a new overlay layer above everything currently stacked.
    /// A focusable layer takes scene focus and becomes modal.
    pub fn create_layer(&self, focusable: bool, bounds: Rect) -> Result<SceneLayer> {
        Ok(self.shared.create_layer(focusable, bounds))
    }
}

/// Scene hosting exactly one composition root. Lighter embedding for hosts
/// that stack platform views instead of scene layers.
pub struct SingleLayerScene {
    shared: Rc<SceneShared>,
}

impl SingleLayerScene {
    pub fn new(
        platform: Rc<dyn PlatformContext>,
        invalidate: InvalidateCallback,
    ) -> Result<Self> {
        Self::with_snapshot_observer(platform, invalidate, Rc::new(NoopSnapshotObserver))
    }

    pub fn with_snapshot_observer(
        platform: Rc<dyn PlatformContext>,
        invalidate: InvalidateCallback,
        snapshot_observer: Rc<dyn SnapshotObserver>,
    ) -> Result<Self> {
        probe_platform(platform.as_ref())?;
        Ok(Self {
            shared: SceneShared::new(platform, invalidate, snapshot_observer),
        })
    }

    scene_common_api!();

    /// This variant cannot host layers
    pub fn create_layer(&self, _focusable: bool, _bounds: Rect) -> Result<SceneLayer> {
        Err(SceneError::LayersUnsupported)
    }
}
