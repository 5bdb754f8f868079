//! Content script: the per-page half of the extension
//!
//! One content script runs per page. It owns the page's [`TrailRenderer`] and
//! drives it from three sources, multiplexed on a single task:
//!
//! - direct messages from the popup and the background (`PING`,
//!   `TOGGLE_LASER`, `UPDATE_SETTINGS`),
//! - change notifications from the local settings store,
//! - the page's own lifecycle (unload).
//!
//! Direct messages are only a latency shortcut; the store notifications alone
//! are enough to keep the renderer in sync with the settings.

use crate::commands::content::handle_content_message;
use crate::config::RendererConfig;
use crate::context::ExtensionContext;
use crate::error::ExtensionResult;
use crate::messaging::{mailbox, request, ContentMessage, ContentReply, Envelope, Inbox, Mailbox};
use crate::page::{PageContext, PageEvent};
use crate::renderer::{TrailConfig, TrailRenderer};
use crate::settings::schema::{COLOR_KEY, ENABLED_KEY, TRAIL_LENGTH_KEY};
use crate::settings::{SettingsStore, StorageArea, StorageChange};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

const MAILBOX_CAPACITY: usize = 32;

pub struct ContentScript {
    id: Uuid,
    renderer: Arc<TrailRenderer>,
    store: Arc<SettingsStore>,
}

/// Owner-side handle of a running content script
pub struct ContentScriptHandle {
    id: Uuid,
    mailbox: Mailbox<ContentMessage, ContentReply>,
    renderer: Arc<TrailRenderer>,
    task: JoinHandle<()>,
}

impl ContentScriptHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn renderer(&self) -> &Arc<TrailRenderer> {
        &self.renderer
    }

    pub fn mailbox(&self) -> Mailbox<ContentMessage, ContentReply> {
        self.mailbox.clone()
    }

    pub async fn send(&self, message: ContentMessage) -> ExtensionResult<ContentReply> {
        request(&self.mailbox, message).await
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ContentScriptHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ContentScript {
    /// Attach a content script to `page` and start its event loop
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        page: Arc<dyn PageContext>,
        store: Arc<SettingsStore>,
        context: Arc<ExtensionContext>,
        config: RendererConfig,
    ) -> ExtensionResult<ContentScriptHandle> {
        let id = Uuid::new_v4();
        let renderer = Arc::new(TrailRenderer::new(page.clone(), context, config)?);
        let (tx, inbox) = mailbox(MAILBOX_CAPACITY);

        // Subscribe before the task runs so no write after injection is missed
        let changes = store.subscribe();
        let page_events = page.events();

        let script = ContentScript {
            id,
            renderer: renderer.clone(),
            store,
        };
        let task = tokio::spawn(script.run(inbox, changes, page_events));

        tracing::info!("Content script {} injected into {}", id, page.url());

        Ok(ContentScriptHandle {
            id,
            mailbox: tx,
            renderer,
            task,
        })
    }

    async fn run(
        self,
        mut inbox: Inbox<ContentMessage, ContentReply>,
        mut changes: broadcast::Receiver<StorageChange>,
        mut page_events: broadcast::Receiver<PageEvent>,
    ) {
        self.load_initial_state();

        let mut storage_open = true;
        loop {
            tokio::select! {
                envelope = inbox.recv() => {
                    let Some(Envelope { message, reply }) = envelope else {
                        break;
                    };
                    tracing::debug!("Content script {} received {:?}", self.id, message);
                    reply.respond(handle_content_message(&self, message));
                }
                change = changes.recv(), if storage_open => match change {
                    Ok(change) => self.on_storage_change(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} storage notifications, re-reading settings", skipped);
                        self.reconcile();
                    }
                    Err(RecvError::Closed) => storage_open = false,
                },
                event = page_events.recv() => match event {
                    Ok(PageEvent::Unload) | Err(RecvError::Closed) => break,
                    // Pointer and resize events belong to the renderer's own listener
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                },
            }
        }

        self.renderer.stop();
        tracing::info!("Content script {} detached", self.id);
    }

    fn load_initial_state(&self) {
        if self.store.settings().enabled {
            self.enable();
        }
    }

    /// Start the trail with the colour and length currently in the store
    pub(crate) fn enable(&self) {
        let settings = self.store.settings();
        match TrailConfig::from_settings(&settings) {
            Ok(config) => {
                self.renderer.start(config);
            }
            Err(e) => tracing::warn!("Cannot start trail: {}", e),
        }
    }

    pub(crate) fn disable(&self) {
        self.renderer.stop();
    }

    /// Apply a new configuration, but only to a running trail
    pub(crate) fn reconfigure(&self, config: TrailConfig) {
        self.renderer.restart_if_active(config);
    }

    fn reconcile(&self) {
        let settings = self.store.settings();
        if !settings.enabled {
            self.disable();
            return;
        }
        match TrailConfig::from_settings(&settings) {
            Ok(config) => {
                if !self.renderer.restart_if_active(config) {
                    self.renderer.start(config);
                }
            }
            Err(e) => tracing::warn!("Cannot start trail: {}", e),
        }
    }

    fn on_storage_change(&self, change: &StorageChange) {
        if change.area != StorageArea::Local {
            return;
        }

        if let Some(enabled) = change.get(ENABLED_KEY) {
            match enabled.new_value.as_ref().and_then(Value::as_bool) {
                Some(true) => self.enable(),
                _ => self.disable(),
            }
        }

        if change.touches(COLOR_KEY) || change.touches(TRAIL_LENGTH_KEY) {
            let settings = self.store.settings();
            match TrailConfig::from_settings(&settings) {
                Ok(config) => self.reconfigure(config),
                Err(e) => tracing::warn!("Ignoring stored trail settings: {}", e),
            }
        }
    }
}
