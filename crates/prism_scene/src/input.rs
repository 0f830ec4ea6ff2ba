//! Input handler: raw platform samples to canonical batches
//!
//! Platforms report one raw sample at a time, and several of them only
//! report button *transitions*, not full state. The input handler bridges
//! that to the canonical batch model:
//!
//! ```text
//! sendPointerEvent / sendKeyEvent (platform glue)
//!     ↓
//! InputHandler (tracked positions/buttons/modifiers, owed resynthesis)
//!     ↓
//! scene routing callback (choose the target owner)
//! ```
//!
//! It also owns the owed-resynthesis flag: when an overlay attaches or
//! detaches, what sits under a stationary mouse changes without any pointer
//! moving, so the next layout re-sends a synthetic Move at the unchanged
//! cursor position to let the scene recompute Enter/Exit.
//!
//! State lives behind `Cell`/`RefCell`: the routing callback runs
//! synchronously and routing re-enters this handler (a detach triggered by
//! an outside-click callback re-arms the owed flag mid-dispatch). No
//! borrow is held while a callback runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use prism_core::{
    Key, KeyEvent, KeyState, Modifiers, Point, PointerButton, PointerButtons, PointerDevice,
    PointerEventKind, PointerId, PointerInputEvent,
};
use rustc_hash::FxHashMap;

/// Scene routing callback for canonical pointer batches
pub type PointerEventCallback = Rc<dyn Fn(&PointerInputEvent)>;

/// Scene key-event consumer; returns whether consumed
pub type KeyEventCallback = Rc<dyn Fn(&KeyEvent) -> bool>;

/// Converts raw samples into the canonical ordered event stream and tracks
/// per-pointer last-known state
pub struct InputHandler {
    on_pointer: PointerEventCallback,
    on_key: KeyEventCallback,
    /// Last-known position per live pointer
    positions: RefCell<FxHashMap<PointerId, Point>>,
    buttons: Cell<PointerButtons>,
    modifiers: Cell<Modifiers>,
    /// A pointer-position re-evaluation is owed (consumed by `on_layout`)
    needs_position_update: Cell<bool>,
    last_time_millis: Cell<u64>,
}

impl InputHandler {
    pub fn new(on_pointer: PointerEventCallback, on_key: KeyEventCallback) -> Self {
        Self {
            on_pointer,
            on_key,
            positions: RefCell::new(FxHashMap::default()),
            buttons: Cell::new(PointerButtons::NONE),
            modifiers: Cell::new(Modifiers::default()),
            needs_position_update: Cell::new(false),
            last_time_millis: Cell::new(0),
        }
    }

    /// Last-known mouse position, if the mouse is inside the scene
    pub fn cursor_position(&self) -> Option<Point> {
        self.positions.borrow().get(&PointerId::MOUSE).copied()
    }

    /// Buttons currently believed pressed (for default-argument callers)
    pub fn buttons(&self) -> PointerButtons {
        self.buttons.get()
    }

    /// Modifiers currently believed held (for default-argument callers)
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers.get()
    }

    /// Forward a canonical batch to the scene, then update tracked state.
    ///
    /// Retention rule: a pointer's position survives iff it is a mouse and
    /// the event is not an Exit, or it is pressed. Non-mouse released
    /// pointers and the mouse on Exit are dropped.
    pub fn on_pointer_event(&self, event: &PointerInputEvent) {
        self.last_time_millis.set(event.time_millis);
        (self.on_pointer)(event);

        let mut positions = self.positions.borrow_mut();
        for pointer in &event.pointers {
            let is_mouse = pointer.device == PointerDevice::Mouse;
            let retain = (is_mouse && event.kind != PointerEventKind::Exit) || pointer.pressed;
            if retain {
                positions.insert(pointer.id, pointer.position);
            } else {
                positions.remove(&pointer.id);
            }
        }
        self.buttons.set(event.buttons);
        self.modifiers.set(event.modifiers);
    }

    /// Build a mouse batch from tracked button/modifier state.
    ///
    /// Default-argument entry points use this instead of assuming "no
    /// buttons": platforms that only report raw button transitions would
    /// otherwise break drag-in-progress semantics. A default Press/Release
    /// synthesizes the left-button transition against the tracked set.
    pub fn default_mouse_event(
        &self,
        kind: PointerEventKind,
        position: Point,
        time_millis: u64,
    ) -> PointerInputEvent {
        let mut buttons = self.buttons.get();
        let mut changed_button = None;
        match kind {
            PointerEventKind::Press => {
                buttons = buttons.with(PointerButton::Left);
                changed_button = Some(PointerButton::Left);
            }
            PointerEventKind::Release => {
                buttons = buttons.without(PointerButton::Left);
                changed_button = Some(PointerButton::Left);
            }
            _ => {}
        }
        PointerInputEvent {
            kind,
            pointers: smallvec::smallvec![prism_core::Pointer::mouse(
                position,
                buttons.any_pressed()
            )],
            buttons,
            modifiers: self.modifiers.get(),
            time_millis,
            scroll_delta: None,
            changed_button,
        }
    }

    /// Called once per frame after layout. Consumes an owed
    /// pointer-position re-evaluation by re-sending a synthetic Move at
    /// the unchanged cursor position, so Enter/Exit recompute against the
    /// new geometry.
    pub fn on_layout(&self) {
        if !self.needs_position_update.replace(false) {
            return;
        }
        if let Some(position) = self.cursor_position() {
            tracing::trace!(?position, "resynthesizing pointer position after layout");
            let event = self.default_mouse_event(
                PointerEventKind::Move,
                position,
                self.last_time_millis.get(),
            );
            self.on_pointer_event(&event);
        }
    }

    /// Mark that pointer positions must be re-evaluated (e.g. an overlay
    /// attached or detached under the cursor)
    pub fn on_pointer_update(&self) {
        self.needs_position_update.set(true);
    }

    /// Update modifier tracking, then forward to the key consumer
    pub fn on_key_event(&self, event: &KeyEvent) -> bool {
        let held = event.state == KeyState::Pressed;
        let mut modifiers = self.modifiers.get();
        match event.key {
            Key::Shift => modifiers.shift = held,
            Key::Ctrl => modifiers.ctrl = held,
            Key::Alt => modifiers.alt = held,
            Key::Meta => modifiers.meta = held,
            _ => {}
        }
        self.modifiers.set(modifiers);
        (self.on_key)(event)
    }

    /// Reset tracked state when the composition root is replaced, so stale
    /// Enter/Exit assumptions never carry across unrelated content
    pub fn on_change_content(&self) {
        self.positions.borrow_mut().clear();
        self.needs_position_update.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{Pointer, PointerButton};
    use smallvec::smallvec;

    fn touch_event(kind: PointerEventKind, id: u64, pressed: bool) -> PointerInputEvent {
        PointerInputEvent {
            kind,
            pointers: smallvec![Pointer::new(
                PointerId(id),
                Point::new(5.0, 5.0),
                pressed,
                PointerDevice::Touch
            )],
            buttons: PointerButtons::NONE,
            modifiers: Modifiers::default(),
            time_millis: 0,
            scroll_delta: None,
            changed_button: None,
        }
    }

    fn handler_with_log() -> (InputHandler, Rc<RefCell<Vec<PointerEventKind>>>) {
        let log: Rc<RefCell<Vec<PointerEventKind>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let handler = InputHandler::new(
            Rc::new(move |event| sink.borrow_mut().push(event.kind)),
            Rc::new(|_| false),
        );
        (handler, log)
    }

    #[test]
    fn test_mouse_position_retained_until_exit() {
        let (handler, _) = handler_with_log();

        let mut event = touch_event(PointerEventKind::Move, 0, false);
        event.pointers[0].device = PointerDevice::Mouse;
        handler.on_pointer_event(&event);
        assert_eq!(handler.cursor_position(), Some(Point::new(5.0, 5.0)));

        let mut exit = event.clone();
        exit.kind = PointerEventKind::Exit;
        handler.on_pointer_event(&exit);
        assert_eq!(handler.cursor_position(), None);
    }

    #[test]
    fn test_released_touch_dropped_from_tracking() {
        let (handler, _) = handler_with_log();

        handler.on_pointer_event(&touch_event(PointerEventKind::Press, 7, true));
        assert!(handler.positions.borrow().contains_key(&PointerId(7)));

        handler.on_pointer_event(&touch_event(PointerEventKind::Release, 7, false));
        assert!(!handler.positions.borrow().contains_key(&PointerId(7)));
    }

    #[test]
    fn test_default_event_derives_tracked_buttons() {
        let (handler, _) = handler_with_log();

        let mut press = touch_event(PointerEventKind::Press, 0, true);
        press.pointers[0].device = PointerDevice::Mouse;
        press.buttons = PointerButtons::NONE.with(PointerButton::Left);
        handler.on_pointer_event(&press);

        // A default-argument Move mid-drag still reports the held button
        let event = handler.default_mouse_event(PointerEventKind::Move, Point::new(9.0, 9.0), 1);
        assert!(event.buttons.contains(PointerButton::Left));
        assert!(event.pointers[0].pressed);
    }

    #[test]
    fn test_default_press_release_synthesize_left_button() {
        let (handler, _) = handler_with_log();

        let press = handler.default_mouse_event(PointerEventKind::Press, Point::ZERO, 0);
        assert!(press.buttons.contains(PointerButton::Left));
        assert!(press.any_pressed());
        assert_eq!(press.changed_button, Some(PointerButton::Left));

        handler.on_pointer_event(&press);
        let release = handler.default_mouse_event(PointerEventKind::Release, Point::ZERO, 1);
        assert!(!release.buttons.any_pressed());
        assert!(!release.any_pressed());
    }

    #[test]
    fn test_on_layout_consumes_owed_update_once() {
        let (handler, log) = handler_with_log();

        let mut event = touch_event(PointerEventKind::Move, 0, false);
        event.pointers[0].device = PointerDevice::Mouse;
        handler.on_pointer_event(&event);
        log.borrow_mut().clear();

        // Nothing owed: no synthetic traffic
        handler.on_layout();
        assert!(log.borrow().is_empty());

        handler.on_pointer_update();
        handler.on_layout();
        assert_eq!(*log.borrow(), vec![PointerEventKind::Move]);

        // Consumed: the next layout is quiet again
        handler.on_layout();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_key_events_update_modifier_tracking() {
        let (handler, _) = handler_with_log();

        handler.on_key_event(&KeyEvent::pressed(Key::Shift));
        assert!(handler.modifiers().shift);

        let event = handler.default_mouse_event(PointerEventKind::Move, Point::ZERO, 0);
        assert!(event.modifiers.shift);

        handler.on_key_event(&KeyEvent::released(Key::Shift));
        assert!(!handler.modifiers().shift);
    }

    #[test]
    fn test_change_content_resets_tracking() {
        let (handler, log) = handler_with_log();

        let mut event = touch_event(PointerEventKind::Move, 0, false);
        event.pointers[0].device = PointerDevice::Mouse;
        handler.on_pointer_event(&event);
        handler.on_pointer_update();

        handler.on_change_content();
        assert_eq!(handler.cursor_position(), None);

        log.borrow_mut().clear();
        handler.on_layout();
        assert!(log.borrow().is_empty());
    }
}
