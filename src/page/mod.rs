//! The web page a content script runs in
//!
//! A page exposes its viewport, a stream of pointer/resize/unload events and a
//! display tree that overlay surfaces can be inserted into.

pub mod simulated;

pub use simulated::{OverlaySnapshot, SimulatedPage};

use crate::renderer::surface::{OverlayStyle, OverlaySurface};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pointer position in viewport (client) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PointerPosition) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    PointerMove(PointerPosition),
    Resize(Viewport),
    /// The page is about to go away
    Unload,
}

pub trait PageContext: Send + Sync {
    fn url(&self) -> &str;

    fn viewport(&self) -> Viewport;

    /// Subscribe to page events from this point on
    fn events(&self) -> broadcast::Receiver<PageEvent>;

    /// Insert a new overlay surface on top of the page content
    fn insert_overlay(&self, style: &OverlayStyle) -> Box<dyn OverlaySurface>;
}

/// Whether scripts may be injected into a page at this address
///
/// Only ordinary web pages qualify; browser-internal and extension pages do not.
pub fn is_injectable_url(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    !rest.is_empty() && (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injectable_urls() {
        assert!(is_injectable_url("https://example.com/"));
        assert!(is_injectable_url("http://localhost:8080/index.html"));
        assert!(is_injectable_url("HTTPS://EXAMPLE.COM"));
    }

    #[test]
    fn test_restricted_urls() {
        assert!(!is_injectable_url("chrome://extensions"));
        assert!(!is_injectable_url("chrome-extension://abc/popup.html"));
        assert!(!is_injectable_url("about:blank"));
        assert!(!is_injectable_url("file:///tmp/index.html"));
        assert!(!is_injectable_url("https://"));
        assert!(!is_injectable_url(""));
    }

    #[test]
    fn test_pointer_distance() {
        let a = PointerPosition::new(0.0, 0.0);
        let b = PointerPosition::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }
}
