//! Canonical input event model
//!
//! Platform glue reports raw samples one at a time; the scene routes
//! immutable multi-pointer batches. This module defines the batch model
//! shared by both sides:
//!
//! ```text
//! Platform sample (one pointer, raw buttons)
//!     ↓
//! PointerInputEvent (ordered pointers, buttons, modifiers, timestamp)
//!     ↓
//! Scene routing → Owner dispatch
//! ```

use smallvec::SmallVec;

use crate::geometry::Point;

/// Stable identity of one contact for the duration of a gesture.
///
/// The single mouse pointer conventionally uses id 0. Touch ids must be
/// unique among concurrently-live pointers within one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub u64);

impl PointerId {
    /// The id used for the single mouse pointer
    pub const MOUSE: PointerId = PointerId(0);
}

/// Kind of pointing device behind a pointer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerDevice {
    #[default]
    Mouse,
    /// Finger contact; imprecise, removed from tracking once released
    Touch,
    Stylus,
}

/// One physical pointer button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl PointerButton {
    fn bit(self) -> u8 {
        match self {
            PointerButton::Left => 1 << 0,
            PointerButton::Right => 1 << 1,
            PointerButton::Middle => 1 << 2,
            PointerButton::Back => 1 << 3,
            PointerButton::Forward => 1 << 4,
        }
    }
}

/// Bitset of currently-pressed pointer buttons
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerButtons(u8);

impl PointerButtons {
    pub const NONE: PointerButtons = PointerButtons(0);

    pub fn contains(&self, button: PointerButton) -> bool {
        self.0 & button.bit() != 0
    }

    #[must_use]
    pub fn with(self, button: PointerButton) -> Self {
        PointerButtons(self.0 | button.bit())
    }

    #[must_use]
    pub fn without(self, button: PointerButton) -> Self {
        PointerButtons(self.0 & !button.bit())
    }

    /// True if any button is currently pressed
    pub fn any_pressed(&self) -> bool {
        self.0 != 0
    }
}

/// Modifier key state carried on every input batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && !self.meta
    }
}

/// High-frequency sub-sample coalesced into one pointer report
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoricalSample {
    pub time_millis: u64,
    pub position: Point,
}

/// One active contact (touch) or the single mouse pointer
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub position: Point,
    /// Whether this pointer is currently down
    pub pressed: bool,
    pub device: PointerDevice,
    pub pressure: f32,
    /// Coalesced sub-samples for high-frequency replay, oldest first
    pub history: SmallVec<[HistoricalSample; 4]>,
}

impl Pointer {
    pub fn new(id: PointerId, position: Point, pressed: bool, device: PointerDevice) -> Self {
        Self {
            id,
            position,
            pressed,
            device,
            pressure: 1.0,
            history: SmallVec::new(),
        }
    }

    /// Convenience constructor for the single mouse pointer
    pub fn mouse(position: Point, pressed: bool) -> Self {
        Self::new(PointerId::MOUSE, position, pressed, PointerDevice::Mouse)
    }
}

/// Event type of a pointer batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEventKind {
    Press,
    Release,
    Move,
    /// Synthetic: pointer entered an owner's region
    Enter,
    /// Synthetic: pointer left an owner's region (or the window)
    Exit,
    Scroll,
}

/// An immutable batch of pointer state at one instant
///
/// For `Press`/`Release`, `changed_button` identifies which button made the
/// transition; pure touch batches leave it `None`.
#[derive(Clone, Debug)]
pub struct PointerInputEvent {
    pub kind: PointerEventKind,
    /// All live pointers, in platform report order
    pub pointers: SmallVec<[Pointer; 2]>,
    pub buttons: PointerButtons,
    pub modifiers: Modifiers,
    pub time_millis: u64,
    /// Scroll delta in lines/logical units, `Scroll` batches only
    pub scroll_delta: Option<Point>,
    pub changed_button: Option<PointerButton>,
}

impl PointerInputEvent {
    /// Position of the primary (first-reported) pointer
    pub fn primary_position(&self) -> Option<Point> {
        self.pointers.first().map(|p| p.position)
    }

    /// True while any pointer in the batch reports down, i.e. a gesture is
    /// in progress
    pub fn any_pressed(&self) -> bool {
        self.pointers.iter().any(|p| p.pressed)
    }

    /// Device of the primary pointer
    pub fn device(&self) -> PointerDevice {
        self.pointers
            .first()
            .map(|p| p.device)
            .unwrap_or_default()
    }

    /// Copy of this batch with a different event kind (used when the scene
    /// rewrites a Move into a synthetic Enter/Exit)
    pub fn with_kind(&self, kind: PointerEventKind) -> Self {
        let mut event = self.clone();
        event.kind = kind;
        event
    }
}

// ============================================================================
// Keyboard
// ============================================================================

/// Key press/release state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Key codes dispatched through the focus subsystem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Ctrl,
    Alt,
    Meta,
    Char(char),
    Unknown,
}

/// Keyboard event delivered to the focused owner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn pressed(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            modifiers: Modifiers::default(),
        }
    }

    pub fn released(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Released,
            modifiers: Modifiers::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_buttons_bitset() {
        let buttons = PointerButtons::NONE
            .with(PointerButton::Left)
            .with(PointerButton::Right);
        assert!(buttons.contains(PointerButton::Left));
        assert!(buttons.contains(PointerButton::Right));
        assert!(!buttons.contains(PointerButton::Middle));
        assert!(buttons.any_pressed());

        let buttons = buttons.without(PointerButton::Left);
        assert!(!buttons.contains(PointerButton::Left));
        assert!(buttons.any_pressed());

        let buttons = buttons.without(PointerButton::Right);
        assert!(!buttons.any_pressed());
    }

    #[test]
    fn test_event_gesture_in_progress() {
        let event = PointerInputEvent {
            kind: PointerEventKind::Move,
            pointers: smallvec![
                Pointer::new(PointerId(1), Point::ZERO, false, PointerDevice::Touch),
                Pointer::new(PointerId(2), Point::ZERO, true, PointerDevice::Touch),
            ],
            buttons: PointerButtons::NONE,
            modifiers: Modifiers::default(),
            time_millis: 0,
            scroll_delta: None,
            changed_button: None,
        };
        assert!(event.any_pressed());
        assert_eq!(event.device(), PointerDevice::Touch);
    }

    #[test]
    fn test_with_kind_preserves_batch() {
        let event = PointerInputEvent {
            kind: PointerEventKind::Move,
            pointers: smallvec![Pointer::mouse(Point::new(3.0, 4.0), false)],
            buttons: PointerButtons::NONE,
            modifiers: Modifiers::default(),
            time_millis: 17,
            scroll_delta: None,
            changed_button: None,
        };
        let enter = event.with_kind(PointerEventKind::Enter);
        assert_eq!(enter.kind, PointerEventKind::Enter);
        assert_eq!(enter.time_millis, 17);
        assert_eq!(enter.primary_position(), Some(Point::new(3.0, 4.0)));
    }
}
