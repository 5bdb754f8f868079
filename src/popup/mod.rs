//! Control panel (the toolbar popup)
//!
//! Every action writes the settings store first; that write is what the
//! content scripts ultimately follow. Sending the command straight to the
//! active page afterwards only makes the change show up sooner, so delivery
//! problems are reported in the returned [`Delivery`] and never raised.

use crate::background::{BackgroundHandle, PageHost};
use crate::config::PanelConfig;
use crate::error::{ExtensionError, ExtensionResult};
use crate::messaging::{BackgroundMessage, ContentMessage, ContentReply};
use crate::settings::{Rgb, SettingsStore};
use parking_lot::Mutex;
use std::sync::Arc;

pub const ENABLE_LABEL: &str = "Enable Laser Pointer";
pub const DISABLE_LABEL: &str = "Disable Laser Pointer";

fn toggle_label(enabled: bool) -> &'static str {
    if enabled {
        DISABLE_LABEL
    } else {
        ENABLE_LABEL
    }
}

/// What the popup form currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub toggle_label: String,
    /// Colour picker value, `#rrggbb`
    pub color: String,
    /// Trail length slider value
    pub trail_length: u32,
    pub closed: bool,
}

/// Outcome of sending a command straight to the active page
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered(ContentReply),
    /// No content script could be brought up; the store change will be picked
    /// up once one runs
    NotReady(Option<String>),
    Failed(String),
}

pub struct ControlPanel<H> {
    store: Arc<SettingsStore>,
    background: Arc<BackgroundHandle>,
    host: Arc<H>,
    config: PanelConfig,
    view: Mutex<PanelView>,
}

impl<H: PageHost> ControlPanel<H> {
    /// Open the panel with the stored settings filled in
    pub fn open(
        store: Arc<SettingsStore>,
        background: Arc<BackgroundHandle>,
        host: Arc<H>,
        config: PanelConfig,
    ) -> Self {
        let settings = store.settings();
        let view = PanelView {
            toggle_label: toggle_label(settings.enabled).to_string(),
            color: settings.color.to_hex(),
            trail_length: config.clamp_trail_length(settings.trail_length),
            closed: false,
        };

        Self {
            store,
            background,
            host,
            config,
            view: Mutex::new(view),
        }
    }

    pub fn view(&self) -> PanelView {
        self.view.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.view.lock().closed
    }

    /// Pick a colour; rejects anything that is not `#rrggbb`
    pub fn set_color(&self, hex: &str) -> ExtensionResult<()> {
        let color = Rgb::parse_hex(hex)?;
        self.view.lock().color = color.to_hex();
        Ok(())
    }

    /// Move the length slider; the value is clamped to the slider's range
    pub fn set_trail_length(&self, trail_length: u32) -> u32 {
        let clamped = self.config.clamp_trail_length(trail_length);
        self.view.lock().trail_length = clamped;
        clamped
    }

    /// Flip the enabled flag and tell the active page
    pub async fn toggle(&self) -> ExtensionResult<Delivery> {
        let enabled = !self.store.settings().enabled;
        self.store.set_enabled(enabled)?;
        self.view.lock().toggle_label = toggle_label(enabled).to_string();
        tracing::info!("Laser pointer {}", if enabled { "enabled" } else { "disabled" });

        let (delivery, _) = tokio::join!(
            self.deliver(ContentMessage::ToggleLaser { enabled }),
            self.close_after_delay()
        );
        Ok(delivery)
    }

    /// Store the picked colour and length and tell the active page
    pub async fn save(&self) -> ExtensionResult<Delivery> {
        let (color, trail_length) = {
            let view = self.view.lock();
            (view.color.clone(), view.trail_length)
        };
        let color = Rgb::parse_hex(&color)?;
        if trail_length == 0 {
            return Err(ExtensionError::InvalidTrailLength(trail_length));
        }

        self.store.set_appearance(color, trail_length)?;
        tracing::info!("Saved trail settings (color={}, length={})", color, trail_length);

        let (delivery, _) = tokio::join!(
            self.deliver(ContentMessage::UpdateSettings {
                color: color.to_hex(),
                trail_length,
            }),
            self.close_after_delay()
        );
        Ok(delivery)
    }

    async fn deliver(&self, message: ContentMessage) -> Delivery {
        let readiness = match self
            .background
            .send(BackgroundMessage::EnsureContentScript)
            .await
        {
            Ok(readiness) => readiness,
            Err(e) => {
                tracing::warn!("Background unreachable: {}", e);
                return Delivery::Failed(e.to_string());
            }
        };

        if !readiness.content_script_ready {
            tracing::info!("Content script not ready, relying on storage listener");
            return Delivery::NotReady(readiness.error);
        }

        let Some(tab) = self.host.active_tab().await else {
            return Delivery::NotReady(Some(ExtensionError::NoActiveTab.to_string()));
        };

        match self.host.send_to_tab(tab.id, message).await {
            Ok(reply) => Delivery::Delivered(reply),
            Err(e) => {
                tracing::info!("Content script not reachable, relying on storage listener: {}", e);
                Delivery::Failed(e.to_string())
            }
        }
    }

    async fn close_after_delay(&self) {
        tokio::time::sleep(self.config.close_delay()).await;
        self.view.lock().closed = true;
        tracing::debug!("Control panel closed");
    }
}
