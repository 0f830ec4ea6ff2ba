//! Prism Core Primitives
//!
//! This crate provides the foundational primitives for the Prism scene
//! engine:
//!
//! - **Geometry**: points, sizes, rects, density, layout direction
//! - **Event Model**: canonical multi-pointer input batches and key events
//! - **Invalidation Tracking**: coalesced, thread-safe redraw/relayout flags
//! - **Frame Recomposition**: cooperative per-frame task queues and the
//!   frame clock
//! - **Canvas**: the draw-sink trait implemented by render backends
//! - **Snapshot Seam**: the contract for the external reactive
//!   read-tracking runtime

pub mod canvas;
pub mod events;
pub mod geometry;
pub mod invalidation;
pub mod recomposer;
pub mod snapshot;

pub use canvas::{Canvas, Color};
pub use events::{
    HistoricalSample, Key, KeyEvent, KeyState, Modifiers, Pointer, PointerButton, PointerButtons,
    PointerDevice, PointerEventKind, PointerId, PointerInputEvent,
};
pub use geometry::{Density, LayoutDirection, Point, Rect, Size};
pub use invalidation::{DeferredCommand, InvalidateCallback, InvalidationTracker};
pub use recomposer::{FrameClock, FrameRecomposer, Phase, Task};
pub use snapshot::{NoopSnapshotObserver, ObservationScope, SnapshotObserver};
