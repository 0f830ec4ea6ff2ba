//! Canvas abstraction
//!
//! The GPU backend is an external collaborator; owners paint through this
//! trait. Drawing must be a pure read of current layout results — a canvas
//! implementation never feeds back into layout state.

use crate::geometry::Rect;

/// RGBA color, non-premultiplied, components in 0..=1
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Black scrim at the given opacity, the conventional dialog dimming
    pub const fn scrim(alpha: f32) -> Self {
        Color::rgba(0.0, 0.0, 0.0, alpha)
    }
}

/// 2D draw sink supplied by the host's render backend
pub trait Canvas {
    /// Fill a rectangle in current-transform coordinates
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Push the current transform/clip state
    fn save(&mut self);

    /// Pop to the most recent save
    fn restore(&mut self);

    /// Intersect the clip with a rectangle
    fn clip_rect(&mut self, rect: Rect);

    /// Translate subsequent drawing
    fn translate(&mut self, dx: f32, dy: f32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrim_color() {
        let scrim = Color::scrim(0.5);
        assert_eq!(scrim, Color::rgba(0.0, 0.0, 0.0, 0.5));
    }
}
