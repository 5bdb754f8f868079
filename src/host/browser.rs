//! In-process browser: tabs, pages and script injection
//!
//! Injecting the content script file into a tab spawns a [`ContentScript`] on
//! that tab's page. Messages to a tab without a running content script fail
//! the same way a real browser's would.

use crate::background::{InjectionPayload, PageHost, TabId, TabInfo};
use crate::config::RendererConfig;
use crate::content::{ContentScript, ContentScriptHandle};
use crate::context::ExtensionContext;
use crate::error::{ExtensionError, ExtensionResult};
use crate::messaging::{request, ContentMessage, ContentReply};
use crate::page::{is_injectable_url, SimulatedPage, Viewport};
use crate::renderer::TrailRenderer;
use crate::settings::SettingsStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

struct SimulatedTab {
    url: String,
    page: Arc<SimulatedPage>,
    script: Option<ContentScriptHandle>,
    injections: u32,
    stylesheets: Vec<String>,
}

pub struct SimulatedBrowser {
    store: Arc<SettingsStore>,
    context: Arc<ExtensionContext>,
    renderer_config: RendererConfig,
    script_file: String,
    tabs: Mutex<BTreeMap<TabId, SimulatedTab>>,
    active: Mutex<Option<TabId>>,
    next_tab_id: AtomicU32,
}

impl SimulatedBrowser {
    /// `script_file` is the file name that brings up the content script
    pub fn new(
        store: Arc<SettingsStore>,
        context: Arc<ExtensionContext>,
        renderer_config: RendererConfig,
        script_file: impl Into<String>,
    ) -> Self {
        Self {
            store,
            context,
            renderer_config,
            script_file: script_file.into(),
            tabs: Mutex::new(BTreeMap::new()),
            active: Mutex::new(None),
            next_tab_id: AtomicU32::new(1),
        }
    }

    /// Open a tab and focus it
    pub fn open_tab(&self, url: impl Into<String>, viewport: Viewport) -> TabId {
        let id = TabId(self.next_tab_id.fetch_add(1, Ordering::SeqCst));
        let url = url.into();
        let page = Arc::new(SimulatedPage::new(url.clone(), viewport));

        self.tabs.lock().insert(
            id,
            SimulatedTab {
                url,
                page,
                script: None,
                injections: 0,
                stylesheets: Vec::new(),
            },
        );
        *self.active.lock() = Some(id);
        id
    }

    pub fn activate(&self, tab: TabId) -> bool {
        if !self.tabs.lock().contains_key(&tab) {
            return false;
        }
        *self.active.lock() = Some(tab);
        true
    }

    pub fn close_tab(&self, tab: TabId) {
        let removed = self.tabs.lock().remove(&tab);
        if let Some(removed) = removed {
            removed.page.unload();
        }

        let mut active = self.active.lock();
        if *active == Some(tab) {
            *active = self.tabs.lock().keys().next_back().copied();
        }
    }

    pub fn page(&self, tab: TabId) -> Option<Arc<SimulatedPage>> {
        self.tabs.lock().get(&tab).map(|t| t.page.clone())
    }

    pub fn renderer(&self, tab: TabId) -> Option<Arc<TrailRenderer>> {
        self.tabs
            .lock()
            .get(&tab)
            .and_then(|t| t.script.as_ref())
            .map(|script| script.renderer().clone())
    }

    pub fn content_script_id(&self, tab: TabId) -> Option<Uuid> {
        self.tabs
            .lock()
            .get(&tab)
            .and_then(|t| t.script.as_ref())
            .map(ContentScriptHandle::id)
    }

    pub fn injection_count(&self, tab: TabId) -> u32 {
        self.tabs.lock().get(&tab).map(|t| t.injections).unwrap_or(0)
    }

    pub fn stylesheets(&self, tab: TabId) -> Vec<String> {
        self.tabs
            .lock()
            .get(&tab)
            .map(|t| t.stylesheets.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageHost for SimulatedBrowser {
    async fn active_tab(&self) -> Option<TabInfo> {
        let active = (*self.active.lock())?;
        self.tabs.lock().get(&active).map(|t| TabInfo {
            id: active,
            url: t.url.clone(),
        })
    }

    async fn tabs(&self) -> Vec<TabInfo> {
        self.tabs
            .lock()
            .iter()
            .map(|(id, t)| TabInfo {
                id: *id,
                url: t.url.clone(),
            })
            .collect()
    }

    async fn send_to_tab(&self, tab: TabId, message: ContentMessage) -> ExtensionResult<ContentReply> {
        if !self.context.is_valid() {
            return Err(ExtensionError::DeliveryFailed(
                "Extension context invalidated.".to_string(),
            ));
        }

        let mailbox = {
            let tabs = self.tabs.lock();
            let entry = tabs
                .get(&tab)
                .ok_or_else(|| ExtensionError::DeliveryFailed(format!("No tab with id: {}.", tab)))?;
            entry
                .script
                .as_ref()
                .filter(|script| script.is_running())
                .map(ContentScriptHandle::mailbox)
        };

        let Some(mailbox) = mailbox else {
            return Err(ExtensionError::DeliveryFailed(
                "Could not establish connection. Receiving end does not exist.".to_string(),
            ));
        };
        request(&mailbox, message).await
    }

    async fn inject(&self, tab: TabId, payload: &InjectionPayload) -> ExtensionResult<()> {
        if !self.context.is_valid() {
            return Err(ExtensionError::InjectionFailed(
                "Extension context invalidated.".to_string(),
            ));
        }

        let mut tabs = self.tabs.lock();
        let entry = tabs
            .get_mut(&tab)
            .ok_or_else(|| ExtensionError::InjectionFailed(format!("No tab with id: {}.", tab)))?;

        if !is_injectable_url(&entry.url) {
            return Err(ExtensionError::InjectionFailed(format!(
                "Cannot access contents of url \"{}\".",
                entry.url
            )));
        }
        if payload.script != self.script_file {
            return Err(ExtensionError::InjectionFailed(format!(
                "Could not load file: '{}'.",
                payload.script
            )));
        }

        let script = ContentScript::spawn(
            entry.page.clone(),
            self.store.clone(),
            self.context.clone(),
            self.renderer_config.clone(),
        )
        .map_err(|e| ExtensionError::InjectionFailed(e.to_string()))?;

        entry.injections += 1;
        entry.stylesheets.extend(payload.stylesheets.iter().cloned());

        if entry.script.as_ref().is_some_and(ContentScriptHandle::is_running) {
            tracing::warn!("Tab {} already runs a content script, replacing it", tab);
        }
        entry.script = Some(script);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{change_bus, StorageArea};

    fn browser() -> SimulatedBrowser {
        let store = Arc::new(SettingsStore::in_memory(StorageArea::Local, change_bus()));
        SimulatedBrowser::new(
            store,
            Arc::new(ExtensionContext::new()),
            RendererConfig::default(),
            "content.js",
        )
    }

    fn payload() -> InjectionPayload {
        InjectionPayload {
            script: "content.js".to_string(),
            stylesheets: vec!["styles.css".to_string()],
        }
    }

    #[tokio::test]
    async fn test_message_to_bare_tab_fails() {
        let browser = browser();
        let tab = browser.open_tab("https://example.com", Viewport::new(800, 600));

        let result = browser.send_to_tab(tab, ContentMessage::Ping).await;
        assert!(matches!(result, Err(ExtensionError::DeliveryFailed(_))));
    }

    #[tokio::test]
    async fn test_injected_tab_answers_ping() {
        let browser = browser();
        let tab = browser.open_tab("https://example.com", Viewport::new(800, 600));

        browser.inject(tab, &payload()).await.unwrap();

        let reply = browser.send_to_tab(tab, ContentMessage::Ping).await.unwrap();
        assert_eq!(reply, ContentReply::Pong { ready: true });
        assert_eq!(browser.injection_count(tab), 1);
        assert_eq!(browser.stylesheets(tab), vec!["styles.css".to_string()]);
        assert!(browser.content_script_id(tab).is_some());
    }

    #[tokio::test]
    async fn test_restricted_tab_refuses_injection() {
        let browser = browser();
        let tab = browser.open_tab("chrome://extensions", Viewport::new(800, 600));

        let result = browser.inject(tab, &payload()).await;
        assert!(matches!(result, Err(ExtensionError::InjectionFailed(_))));
        assert_eq!(browser.injection_count(tab), 0);
    }

    #[tokio::test]
    async fn test_unknown_script_file_refused() {
        let browser = browser();
        let tab = browser.open_tab("https://example.com", Viewport::new(800, 600));
        let bogus = InjectionPayload {
            script: "missing.js".to_string(),
            stylesheets: vec![],
        };

        assert!(browser.inject(tab, &bogus).await.is_err());
    }

    #[tokio::test]
    async fn test_active_tab_follows_focus() {
        let browser = browser();
        let first = browser.open_tab("https://a.test", Viewport::new(800, 600));
        let second = browser.open_tab("https://b.test", Viewport::new(800, 600));

        assert_eq!(browser.active_tab().await.unwrap().id, second);
        assert!(browser.activate(first));
        assert_eq!(browser.active_tab().await.unwrap().url, "https://a.test");

        browser.close_tab(first);
        assert_eq!(browser.active_tab().await.unwrap().id, second);
        assert_eq!(browser.tabs().await.len(), 1);
        assert!(!browser.activate(first));
    }

    #[tokio::test]
    async fn test_invalidated_context_blocks_messaging() {
        let browser = browser();
        let tab = browser.open_tab("https://example.com", Viewport::new(800, 600));
        browser.inject(tab, &payload()).await.unwrap();

        browser.context.invalidate();

        assert!(browser.send_to_tab(tab, ContentMessage::Ping).await.is_err());
        assert!(browser.inject(tab, &payload()).await.is_err());
    }
}
