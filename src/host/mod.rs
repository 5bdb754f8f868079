//! Simulated browser host
//!
//! Implements the browser capabilities the extension needs (tabs, messaging,
//! injection) in-process, and wires a complete extension on top of it for the
//! demo binary and the tests.

pub mod browser;

pub use browser::SimulatedBrowser;

use crate::background::{spawn_background, BackgroundHandle, LifecycleCoordinator};
use crate::config::ExtensionConfig;
use crate::context::ExtensionContext;
use crate::error::ExtensionResult;
use crate::popup::ControlPanel;
use crate::settings::{change_bus, SettingsStore, StorageArea};
use std::sync::Arc;

/// Every extension context, running against a [`SimulatedBrowser`]
pub struct SimulatedExtension {
    pub config: ExtensionConfig,
    pub store: Arc<SettingsStore>,
    pub context: Arc<ExtensionContext>,
    pub browser: Arc<SimulatedBrowser>,
    pub coordinator: Arc<LifecycleCoordinator<SimulatedBrowser>>,
    pub background: Arc<BackgroundHandle>,
}

impl SimulatedExtension {
    /// Fails if `config` does not validate.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ExtensionConfig, store: Arc<SettingsStore>) -> ExtensionResult<Self> {
        config.validate()?;

        let context = Arc::new(ExtensionContext::new());
        let browser = Arc::new(SimulatedBrowser::new(
            store.clone(),
            context.clone(),
            config.renderer.clone(),
            config.lifecycle.script_file.clone(),
        ));
        let coordinator = Arc::new(LifecycleCoordinator::new(
            browser.clone(),
            store.clone(),
            config.lifecycle.clone(),
        ));
        let background = Arc::new(spawn_background(coordinator.clone()));

        Ok(Self {
            config,
            store,
            context,
            browser,
            coordinator,
            background,
        })
    }

    pub fn in_memory(config: ExtensionConfig) -> ExtensionResult<Self> {
        let store = Arc::new(SettingsStore::in_memory(StorageArea::Local, change_bus()));
        Self::new(config, store)
    }

    /// Run the install hook
    pub async fn install(&self) -> ExtensionResult<()> {
        self.coordinator.on_installed().await
    }

    /// Open the toolbar popup
    pub fn open_panel(&self) -> ControlPanel<SimulatedBrowser> {
        ControlPanel::open(
            self.store.clone(),
            self.background.clone(),
            self.browser.clone(),
            self.config.panel.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtensionError;

    #[tokio::test]
    async fn test_new_refuses_zero_frame_interval() {
        let mut config = ExtensionConfig::default();
        config.renderer.frame_interval_ms = 0;

        let result = SimulatedExtension::in_memory(config);
        assert!(matches!(result, Err(ExtensionError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_new_refuses_inverted_slider_range() {
        let mut config = ExtensionConfig::default();
        config.panel.min_trail_length = 80;
        config.panel.max_trail_length = 20;

        assert!(SimulatedExtension::in_memory(config).is_err());
    }

    #[tokio::test]
    async fn test_new_accepts_defaults() {
        let extension = SimulatedExtension::in_memory(ExtensionConfig::default()).unwrap();
        assert!(extension.context.is_valid());
        assert!(!extension.store.settings().enabled);
    }
}
