//! Platform contract for Prism scenes
//!
//! A scene does not talk to any windowing toolkit directly; the platform
//! glue (desktop window toolkit, UIKit view hierarchy, browser DOM)
//! implements [`PlatformContext`] and feeds raw events into the scene. The
//! scene's only outbound signals are the invalidate callback, pointer-icon
//! change requests, and focus-request bridging when no owner accepts focus
//! internally.

pub mod error;

use std::cell::Cell;

use prism_core::{Density, LayoutDirection, Rect};

pub use error::PlatformError;

/// Mouse cursor appearance requested by hovered content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointerIcon {
    #[default]
    Default,
    Text,
    Hand,
    Crosshair,
    Move,
    NotAllowed,
}

/// Services the host platform supplies to a scene.
///
/// Implementations live in platform glue and are out of scope for the
/// engine itself; [`HeadlessPlatform`] covers tests and host-less
/// embedding.
pub trait PlatformContext {
    /// Current display density (physical pixels per logical unit)
    fn density(&self) -> Density;

    /// Current layout direction
    fn layout_direction(&self) -> LayoutDirection;

    /// Bounds of the hosting window/view in scene coordinates
    fn window_bounds(&self) -> Rect;

    /// Request a pointer-icon change for the hosting window
    fn set_pointer_icon(&self, icon: PointerIcon);

    /// Focus bridging: ask the platform to move focus out of the scene
    /// (e.g. tab past the last focusable element). Returns whether the
    /// platform accepted.
    fn request_focus(&self) -> bool;
}

/// Platform context for tests and host-less embedding.
///
/// Records the last requested pointer icon and never accepts focus
/// bridging.
pub struct HeadlessPlatform {
    density: Density,
    layout_direction: LayoutDirection,
    bounds: Rect,
    pointer_icon: Cell<PointerIcon>,
}

impl HeadlessPlatform {
    pub fn new(bounds: Rect) -> Self {
        Self {
            density: Density::default(),
            layout_direction: LayoutDirection::default(),
            bounds,
            pointer_icon: Cell::new(PointerIcon::Default),
        }
    }

    pub fn with_density(mut self, density: Density) -> Self {
        self.density = density;
        self
    }

    /// Last pointer icon requested through this context
    pub fn pointer_icon(&self) -> PointerIcon {
        self.pointer_icon.get()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 800.0, 600.0))
    }
}

impl PlatformContext for HeadlessPlatform {
    fn density(&self) -> Density {
        self.density
    }

    fn layout_direction(&self) -> LayoutDirection {
        self.layout_direction
    }

    fn window_bounds(&self) -> Rect {
        self.bounds
    }

    fn set_pointer_icon(&self, icon: PointerIcon) {
        self.pointer_icon.set(icon);
    }

    fn request_focus(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_records_pointer_icon() {
        let platform = HeadlessPlatform::default();
        assert_eq!(platform.pointer_icon(), PointerIcon::Default);

        platform.set_pointer_icon(PointerIcon::Hand);
        assert_eq!(platform.pointer_icon(), PointerIcon::Hand);
    }

    #[test]
    fn test_headless_rejects_focus_bridging() {
        let platform = HeadlessPlatform::default();
        assert!(!platform.request_focus());
    }
}
