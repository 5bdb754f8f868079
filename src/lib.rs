//! Laser Trail - a fading laser-pointer trail that follows the cursor.
//!
//! This is the main library crate of the extension. It contains the three
//! extension contexts (background, popup and content script), the settings
//! store they share, and a simulated browser host that runs them in-process.

pub mod background;
pub mod commands;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod host;
pub mod messaging;
pub mod page;
pub mod popup;
pub mod renderer;
pub mod settings;

pub use config::ExtensionConfig;
pub use error::{ExtensionError, ExtensionResult};

use anyhow::Context;
use host::SimulatedExtension;
use page::{PageContext, Viewport};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "laser_trail=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the extension against a simulated browser
///
/// The first command-line argument, if any, is a JSON config file.
pub fn run() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Laser Trail v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => ExtensionConfig::load(Path::new(&path))
            .with_context(|| format!("failed to load config from {}", path))?,
        None => ExtensionConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(demo(config))
}

async fn demo(config: ExtensionConfig) -> anyhow::Result<()> {
    let frame = config.renderer.frame_interval();
    let extension = SimulatedExtension::in_memory(config)?;

    extension
        .browser
        .open_tab("chrome://extensions", Viewport::new(1280, 720));
    let tab = extension
        .browser
        .open_tab("https://example.com/", Viewport::new(1280, 720));
    extension.install().await?;

    let delivery = extension.open_panel().toggle().await?;
    tracing::info!("Toggle delivery: {:?}", delivery);

    let page = extension.browser.page(tab).context("tab was closed")?;
    let renderer = extension
        .browser
        .renderer(tab)
        .context("no content script in the tab")?;

    for step in 0..=40 {
        let t = step as f64;
        page.move_pointer(100.0 + t * 15.0, 300.0 + (t * 0.3).sin() * 80.0);
        tokio::time::sleep(frame).await;
    }
    tracing::info!(
        "After the sweep: {} trail points, {} circles on screen, overlay {:?}",
        renderer.points().len(),
        page.overlays().first().map(|o| o.circles.len()).unwrap_or(0),
        page.viewport()
    );

    tokio::time::sleep(frame * 60).await;
    tracing::info!("After fading: {} trail points", renderer.points().len());

    let panel = extension.open_panel();
    panel.set_color("#00ffcc")?;
    panel.set_trail_length(80);
    let delivery = panel.save().await?;
    tracing::info!(
        "Save delivery: {:?}, trail now {:?}",
        delivery,
        renderer.trail_config()
    );

    let delivery = extension.open_panel().toggle().await?;
    tracing::info!(
        "Toggle delivery: {:?}, overlays left on the page: {}",
        delivery,
        page.overlay_count()
    );

    Ok(())
}
