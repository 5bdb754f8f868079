//! In-process page used by the simulated browser
//!
//! Overlay surfaces inserted into a simulated page keep the draw calls of
//! their most recent frame, so callers can inspect what would be on screen.

use crate::page::{PageContext, PageEvent, PointerPosition, Viewport};
use crate::renderer::surface::{GlowCircle, OverlayStyle, OverlaySurface};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

type DisplayTree = Mutex<BTreeMap<u64, CanvasState>>;

#[derive(Debug, Clone)]
struct CanvasState {
    style: OverlayStyle,
    size: Viewport,
    circles: Vec<GlowCircle>,
    clears: u64,
}

/// What an overlay currently shows
#[derive(Debug, Clone)]
pub struct OverlaySnapshot {
    pub id: u64,
    pub style: OverlayStyle,
    pub size: Viewport,
    /// Circles drawn since the last clear
    pub circles: Vec<GlowCircle>,
    /// Number of times the surface was cleared, roughly one per frame
    pub clears: u64,
}

pub struct SimulatedPage {
    url: String,
    viewport: Mutex<Viewport>,
    events: broadcast::Sender<PageEvent>,
    display_tree: Arc<DisplayTree>,
    next_overlay_id: AtomicU64,
}

impl SimulatedPage {
    pub fn new(url: impl Into<String>, viewport: Viewport) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            url: url.into(),
            viewport: Mutex::new(viewport),
            events,
            display_tree: Arc::new(Mutex::new(BTreeMap::new())),
            next_overlay_id: AtomicU64::new(1),
        }
    }

    pub fn move_pointer(&self, x: f64, y: f64) {
        self.emit(PageEvent::PointerMove(PointerPosition::new(x, y)));
    }

    pub fn resize(&self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        *self.viewport.lock() = viewport;
        self.emit(PageEvent::Resize(viewport));
    }

    pub fn unload(&self) {
        self.emit(PageEvent::Unload);
    }

    pub fn overlay_count(&self) -> usize {
        self.display_tree.lock().len()
    }

    pub fn overlays(&self) -> Vec<OverlaySnapshot> {
        self.display_tree
            .lock()
            .iter()
            .map(|(id, state)| OverlaySnapshot {
                id: *id,
                style: state.style.clone(),
                size: state.size,
                circles: state.circles.clone(),
                clears: state.clears,
            })
            .collect()
    }

    fn emit(&self, event: PageEvent) {
        // Events with no listener attached are simply lost, as on a real page
        let _ = self.events.send(event);
    }
}

impl PageContext for SimulatedPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    fn events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    fn insert_overlay(&self, style: &OverlayStyle) -> Box<dyn OverlaySurface> {
        let id = self.next_overlay_id.fetch_add(1, Ordering::SeqCst);
        self.display_tree.lock().insert(
            id,
            CanvasState {
                style: style.clone(),
                size: self.viewport(),
                circles: Vec::new(),
                clears: 0,
            },
        );
        Box::new(SimulatedSurface {
            id,
            tree: Arc::downgrade(&self.display_tree),
        })
    }
}

struct SimulatedSurface {
    id: u64,
    tree: Weak<DisplayTree>,
}

impl SimulatedSurface {
    /// Run `f` against this surface's canvas; a no-op once it has been removed
    fn with_canvas<R>(&self, f: impl FnOnce(&mut CanvasState) -> R) -> Option<R> {
        let tree = self.tree.upgrade()?;
        let mut tree = tree.lock();
        tree.get_mut(&self.id).map(f)
    }
}

impl OverlaySurface for SimulatedSurface {
    fn size(&self) -> Viewport {
        self.with_canvas(|canvas| canvas.size)
            .unwrap_or(Viewport::new(0, 0))
    }

    fn resize(&mut self, viewport: Viewport) {
        self.with_canvas(|canvas| {
            canvas.size = viewport;
            // Resizing a canvas wipes its contents
            canvas.circles.clear();
        });
    }

    fn clear(&mut self) {
        self.with_canvas(|canvas| {
            canvas.circles.clear();
            canvas.clears += 1;
        });
    }

    fn fill_circle(&mut self, circle: &GlowCircle) {
        self.with_canvas(|canvas| canvas.circles.push(circle.clone()));
    }

    fn remove(&mut self) {
        if let Some(tree) = self.tree.upgrade() {
            tree.lock().remove(&self.id);
        }
    }
}
