//! Overlay drawing surface
//!
//! The renderer only needs a tiny slice of a 2D canvas: clear, filled circles
//! with a glow, resize, and removal from the page.

use crate::page::Viewport;
use crate::settings::Rgba;

/// How an overlay is stacked on the page
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub z_index: i32,
    /// Pointer events pass through to the page underneath
    pub pointer_transparent: bool,
}

/// A filled circle with a soft glow around it
#[derive(Debug, Clone, PartialEq)]
pub struct GlowCircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub fill: Rgba,
    pub glow: Rgba,
    pub blur: f64,
}

/// A full-viewport layer stacked above the page content
///
/// Drawing on a removed surface must be a no-op.
pub trait OverlaySurface: Send {
    fn size(&self) -> Viewport;

    fn resize(&mut self, viewport: Viewport);

    fn clear(&mut self);

    fn fill_circle(&mut self, circle: &GlowCircle);

    /// Detach the surface from the page. Calling it twice is harmless.
    fn remove(&mut self);
}
