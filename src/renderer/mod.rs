//! Trail renderer: draws the fading cursor trail over a page
//!
//! A renderer is either Inactive or Active. While Active it owns an overlay
//! surface in the page plus three background tasks:
//!
//! - the animation loop, which draws one frame per tick and keeps ticking only
//!   while the renderer is Active,
//! - the page listener, which feeds pointer moves into the trail and keeps the
//!   overlay sized to the viewport,
//! - the liveness watchdog, which tears everything down once the extension
//!   context disappears.
//!
//! All of them share the renderer state through one mutex. `restart` runs its
//! stop and start under a single lock acquisition, so two reconfigurations
//! can never interleave.

pub mod surface;
pub mod trail;

pub use surface::{GlowCircle, OverlayStyle, OverlaySurface};
pub use trail::{Trail, TrailPoint};

use crate::config::RendererConfig;
use crate::context::ExtensionContext;
use crate::error::ExtensionResult;
use crate::page::{PageContext, PageEvent, PointerPosition};
use crate::settings::{fade_rate, Rgb, Settings};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Colour and fade speed of an active trail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailConfig {
    pub color: Rgb,
    /// Alpha removed from every point per frame
    pub fade_rate: f64,
}

impl TrailConfig {
    pub fn new(color: Rgb, trail_length: u32) -> ExtensionResult<Self> {
        Ok(Self {
            color,
            fade_rate: fade_rate(trail_length)?,
        })
    }

    pub fn from_settings(settings: &Settings) -> ExtensionResult<Self> {
        Self::new(settings.color, settings.trail_length)
    }
}

pub enum RendererState {
    Inactive,
    Active(ActiveTrail),
}

/// Resources held while the trail is being drawn
pub struct ActiveTrail {
    config: TrailConfig,
    surface: Box<dyn OverlaySurface>,
    animation: JoinHandle<()>,
    listener: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

struct Shared {
    state: RendererState,
    trail: Trail,
}

pub struct TrailRenderer {
    shared: Arc<Mutex<Shared>>,
    page: Arc<dyn PageContext>,
    context: Arc<ExtensionContext>,
    config: RendererConfig,
}

impl TrailRenderer {
    /// Fails if `config` has a zero interval or a non-positive point spacing
    pub fn new(
        page: Arc<dyn PageContext>,
        context: Arc<ExtensionContext>,
        config: RendererConfig,
    ) -> ExtensionResult<Self> {
        config.validate()?;
        let trail = Trail::new(config.point_spacing);
        Ok(Self {
            shared: Arc::new(Mutex::new(Shared {
                state: RendererState::Inactive,
                trail,
            })),
            page,
            context,
            config,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.shared.lock().state, RendererState::Active(_))
    }

    /// Configuration of the running trail, if any
    pub fn trail_config(&self) -> Option<TrailConfig> {
        match &self.shared.lock().state {
            RendererState::Active(active) => Some(active.config),
            RendererState::Inactive => None,
        }
    }

    pub fn points(&self) -> Vec<TrailPoint> {
        self.shared.lock().trail.points().to_vec()
    }

    /// Begin drawing. Returns false if the trail was already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, trail: TrailConfig) -> bool {
        let mut shared = self.shared.lock();
        self.start_locked(&mut shared, trail)
    }

    /// Stop drawing and release the overlay. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        stop_locked(&mut self.shared.lock())
    }

    /// Stop and start again with a new configuration, resetting the trail
    pub fn restart(&self, trail: TrailConfig) {
        let mut shared = self.shared.lock();
        stop_locked(&mut shared);
        self.start_locked(&mut shared, trail);
    }

    /// Restart with a new configuration, but only if the trail is running.
    /// Returns false, leaving the renderer stopped, otherwise.
    pub fn restart_if_active(&self, trail: TrailConfig) -> bool {
        let mut shared = self.shared.lock();
        if !stop_locked(&mut shared) {
            return false;
        }
        self.start_locked(&mut shared, trail)
    }

    /// Feed a pointer sample; ignored while inactive
    pub fn on_pointer_move(&self, position: PointerPosition) -> usize {
        push_pointer(&mut self.shared.lock(), position)
    }

    /// Draw one frame and fade the trail. Returns false when inactive.
    pub fn draw_frame(&self) -> bool {
        draw_frame(&mut self.shared.lock(), &self.config)
    }

    fn start_locked(&self, shared: &mut Shared, trail: TrailConfig) -> bool {
        if matches!(shared.state, RendererState::Active(_)) {
            tracing::debug!("Trail already active, ignoring start");
            return false;
        }

        let style = OverlayStyle {
            z_index: self.config.overlay_z_index,
            pointer_transparent: true,
        };
        let surface = self.page.insert_overlay(&style);
        let size = surface.size();

        shared.trail.clear();

        // Subscribe before returning so no pointer move is missed
        let events = self.page.events();
        let weak = Arc::downgrade(&self.shared);
        let listener = tokio::spawn(listen(weak.clone(), events));
        let animation = tokio::spawn(animate(weak.clone(), self.config.clone()));
        let watchdog = tokio::spawn(watch_context(
            weak,
            self.context.clone(),
            self.config.liveness_interval(),
        ));

        shared.state = RendererState::Active(ActiveTrail {
            config: trail,
            surface,
            animation,
            listener,
            watchdog,
        });

        tracing::info!(
            "Trail started on {} (color={}, fade_rate={:.4}, overlay={}x{})",
            self.page.url(),
            trail.color,
            trail.fade_rate,
            size.width,
            size.height
        );
        true
    }
}

impl Drop for TrailRenderer {
    fn drop(&mut self) {
        stop_locked(&mut self.shared.lock());
    }
}

fn stop_locked(shared: &mut Shared) -> bool {
    let state = std::mem::replace(&mut shared.state, RendererState::Inactive);
    let RendererState::Active(mut active) = state else {
        return false;
    };

    active.animation.abort();
    active.listener.abort();
    active.watchdog.abort();
    active.surface.remove();
    shared.trail.clear();

    tracing::info!("Trail stopped");
    true
}

fn push_pointer(shared: &mut Shared, position: PointerPosition) -> usize {
    if !matches!(shared.state, RendererState::Active(_)) {
        return 0;
    }
    shared.trail.push_pointer(position)
}

fn draw_frame(shared: &mut Shared, config: &RendererConfig) -> bool {
    let Shared { state, trail } = shared;
    let RendererState::Active(active) = state else {
        return false;
    };

    let color = active.config.color;
    let glow = color.with_alpha(config.glow_alpha);
    let surface = &mut active.surface;

    surface.clear();
    for point in trail.points() {
        surface.fill_circle(&GlowCircle {
            x: point.x,
            y: point.y,
            radius: config.point_radius,
            fill: color.with_alpha(point.alpha),
            glow,
            blur: config.glow_blur,
        });
    }
    trail.fade(active.config.fade_rate);
    true
}

async fn animate(shared: Weak<Mutex<Shared>>, config: RendererConfig) {
    // The first tick completes at once, so the overlay is drawn on start
    let mut frames = interval(config.frame_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        frames.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !draw_frame(&mut shared.lock(), &config) {
            break;
        }
    }
}

async fn listen(shared: Weak<Mutex<Shared>>, mut events: broadcast::Receiver<PageEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Trail listener fell behind, skipped {} page events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(shared) = shared.upgrade() else {
            break;
        };
        let mut shared = shared.lock();
        match event {
            PageEvent::PointerMove(position) => {
                push_pointer(&mut shared, position);
            }
            PageEvent::Resize(viewport) => {
                if let RendererState::Active(active) = &mut shared.state {
                    active.surface.resize(viewport);
                }
            }
            // Unload is handled by the content script
            PageEvent::Unload => {}
        }
    }
}

async fn watch_context(
    shared: Weak<Mutex<Shared>>,
    context: Arc<ExtensionContext>,
    period: Duration,
) {
    let mut checks = interval_at(Instant::now() + period, period);
    loop {
        checks.tick().await;
        if context.is_valid() {
            continue;
        }

        tracing::warn!("Extension context lost, tearing down trail");
        if let Some(shared) = shared.upgrade() {
            stop_locked(&mut shared.lock());
        }
        break;
    }
}
