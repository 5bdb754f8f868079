//! Lifecycle coordinator
//!
//! Makes sure the active page has a live content script before the popup
//! talks to it. The page is probed first; only when the probe fails is the
//! script injected, followed by a short settling delay so its listeners are
//! attached before the first real message arrives. Ensure requests are
//! serialized so two overlapping requests can never both inject.

use crate::config::LifecycleConfig;
use crate::error::{ExtensionError, ExtensionResult};
use crate::messaging::{ContentMessage, ContentReply, EnsureReply};
use crate::page::is_injectable_url;
use crate::settings::SettingsStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// Files injected into a page to bring up the content script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPayload {
    pub script: String,
    pub stylesheets: Vec<String>,
}

impl InjectionPayload {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            script: config.script_file.clone(),
            stylesheets: config.stylesheet_files.clone(),
        }
    }
}

/// Browser capabilities the background relies on
#[async_trait]
pub trait PageHost: Send + Sync {
    /// The focused tab of the current window
    async fn active_tab(&self) -> Option<TabInfo>;

    async fn tabs(&self) -> Vec<TabInfo>;

    /// Deliver a message to the content script of `tab`
    async fn send_to_tab(&self, tab: TabId, message: ContentMessage) -> ExtensionResult<ContentReply>;

    /// Execute the payload's script and insert its stylesheets into `tab`
    async fn inject(&self, tab: TabId, payload: &InjectionPayload) -> ExtensionResult<()>;
}

pub struct LifecycleCoordinator<H> {
    host: Arc<H>,
    store: Arc<SettingsStore>,
    config: LifecycleConfig,
    payload: InjectionPayload,
    ensure_lock: Mutex<()>,
}

impl<H: PageHost> LifecycleCoordinator<H> {
    pub fn new(host: Arc<H>, store: Arc<SettingsStore>, config: LifecycleConfig) -> Self {
        let payload = InjectionPayload::from_config(&config);
        Self {
            host,
            store,
            config,
            payload,
            ensure_lock: Mutex::new(()),
        }
    }

    /// Make sure the active tab has a responsive content script
    pub async fn ensure_content_script(&self) -> EnsureReply {
        let Some(tab) = self.host.active_tab().await else {
            return EnsureReply::failed(ExtensionError::NoActiveTab.to_string());
        };
        self.ensure_tab(&tab).await
    }

    pub async fn ensure_tab(&self, tab: &TabInfo) -> EnsureReply {
        let _guard = self.ensure_lock.lock().await;

        match self.probe(tab.id).await {
            Ok(()) => return EnsureReply::ready(),
            Err(e) => tracing::debug!("Probe of tab {} failed: {}", tab.id, e),
        }

        if !is_injectable_url(&tab.url) {
            tracing::debug!("Not injecting into restricted page {}", tab.url);
            return EnsureReply::failed(format!("Cannot inject scripts into {}", tab.url));
        }

        match self.host.inject(tab.id, &self.payload).await {
            Ok(()) => {
                tokio::time::sleep(self.config.settling_delay()).await;
                tracing::info!("Injected content script into tab {}", tab.id);
                EnsureReply::injected()
            }
            Err(e) => {
                tracing::error!("Failed to inject content script into tab {}: {}", tab.id, e);
                EnsureReply::failed(e.to_string())
            }
        }
    }

    /// Runs when the extension is installed or updated: reset the enabled
    /// flag and bring up content scripts in pages that were already open
    pub async fn on_installed(&self) -> ExtensionResult<()> {
        self.store.set_enabled(false)?;

        for tab in self.host.tabs().await {
            if !is_injectable_url(&tab.url) {
                continue;
            }
            let reply = self.ensure_tab(&tab).await;
            if !reply.content_script_ready {
                tracing::warn!(
                    "Script injection failed on tab {}: {}",
                    tab.id,
                    reply.error.unwrap_or_default()
                );
            }
        }
        Ok(())
    }

    async fn probe(&self, tab: TabId) -> ExtensionResult<()> {
        let reply = tokio::time::timeout(
            self.config.probe_timeout(),
            self.host.send_to_tab(tab, ContentMessage::Ping),
        )
        .await
        .map_err(|_| ExtensionError::DeliveryFailed("liveness probe timed out".to_string()))??;

        match reply {
            ContentReply::Pong { ready: true } => Ok(()),
            other => Err(ExtensionError::DeliveryFailed(format!(
                "unexpected probe reply {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{change_bus, StorageArea};
    use parking_lot::Mutex as ParkingMutex;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Probe {
        Answer,
        Refuse,
        Hang,
    }

    /// Host whose pages answer probes as told and come alive once injected
    struct FakeHost {
        tabs: Vec<TabInfo>,
        probe: ParkingMutex<HashMap<TabId, Probe>>,
        injections: ParkingMutex<Vec<(TabId, InjectionPayload)>>,
        refuse_injection: bool,
    }

    impl FakeHost {
        fn new(tabs: &[(u32, &str, Probe)]) -> Self {
            Self {
                tabs: tabs
                    .iter()
                    .map(|(id, url, _)| TabInfo {
                        id: TabId(*id),
                        url: url.to_string(),
                    })
                    .collect(),
                probe: ParkingMutex::new(tabs.iter().map(|(id, _, p)| (TabId(*id), *p)).collect()),
                injections: ParkingMutex::new(Vec::new()),
                refuse_injection: false,
            }
        }

        fn injected_tabs(&self) -> Vec<TabId> {
            self.injections.lock().iter().map(|(tab, _)| *tab).collect()
        }
    }

    #[async_trait]
    impl PageHost for FakeHost {
        async fn active_tab(&self) -> Option<TabInfo> {
            self.tabs.first().cloned()
        }

        async fn tabs(&self) -> Vec<TabInfo> {
            self.tabs.clone()
        }

        async fn send_to_tab(&self, tab: TabId, _message: ContentMessage) -> ExtensionResult<ContentReply> {
            let probe = self.probe.lock().get(&tab).copied().unwrap_or(Probe::Refuse);
            match probe {
                Probe::Answer => Ok(ContentReply::Pong { ready: true }),
                Probe::Refuse => Err(ExtensionError::DeliveryFailed(
                    "Receiving end does not exist.".to_string(),
                )),
                Probe::Hang => std::future::pending().await,
            }
        }

        async fn inject(&self, tab: TabId, payload: &InjectionPayload) -> ExtensionResult<()> {
            if self.refuse_injection {
                return Err(ExtensionError::InjectionFailed(
                    "Cannot access contents of the page.".to_string(),
                ));
            }
            self.injections.lock().push((tab, payload.clone()));
            self.probe.lock().insert(tab, Probe::Answer);
            Ok(())
        }
    }

    fn coordinator(host: FakeHost) -> (Arc<FakeHost>, Arc<SettingsStore>, LifecycleCoordinator<FakeHost>) {
        let host = Arc::new(host);
        let store = Arc::new(SettingsStore::in_memory(StorageArea::Local, change_bus()));
        let coordinator = LifecycleCoordinator::new(host.clone(), store.clone(), LifecycleConfig::default());
        (host, store, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_page_is_not_injected() {
        let (host, _store, coordinator) = coordinator(FakeHost::new(&[(1, "https://a.test/", Probe::Answer)]));

        assert_eq!(coordinator.ensure_content_script().await, EnsureReply::ready());
        assert!(host.injected_tabs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_page_is_injected_then_settles() {
        let (host, _store, coordinator) = coordinator(FakeHost::new(&[(1, "https://a.test/", Probe::Refuse)]));

        let started = tokio::time::Instant::now();
        assert_eq!(coordinator.ensure_content_script().await, EnsureReply::injected());
        assert!(started.elapsed() >= Duration::from_millis(100));

        let injections = host.injections.lock().clone();
        assert_eq!(injections.len(), 1);
        assert_eq!(injections[0].1.script, "content.js");
        assert_eq!(injections[0].1.stylesheets, vec!["styles.css".to_string()]);

        // Second ensure finds the injected script alive
        assert_eq!(coordinator.ensure_content_script().await, EnsureReply::ready());
        assert_eq!(host.injected_tabs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_page_times_out_into_injection() {
        let (host, _store, coordinator) = coordinator(FakeHost::new(&[(1, "http://a.test/", Probe::Hang)]));

        assert_eq!(coordinator.ensure_content_script().await, EnsureReply::injected());
        assert_eq!(host.injected_tabs(), vec![TabId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restricted_page_is_skipped() {
        let (host, _store, coordinator) = coordinator(FakeHost::new(&[(1, "chrome://settings", Probe::Refuse)]));

        let reply = coordinator.ensure_content_script().await;
        assert!(!reply.content_script_ready);
        assert!(reply.error.unwrap().contains("chrome://settings"));
        assert!(host.injected_tabs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_injection_failure_is_reported() {
        let mut host = FakeHost::new(&[(1, "https://a.test/", Probe::Refuse)]);
        host.refuse_injection = true;
        let (_host, _store, coordinator) = coordinator(host);

        let reply = coordinator.ensure_content_script().await;
        assert!(!reply.content_script_ready);
        assert_eq!(reply.injected, None);
        assert!(reply.error.unwrap().contains("Cannot access contents"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_active_tab() {
        let (_host, _store, coordinator) = coordinator(FakeHost::new(&[]));

        let reply = coordinator.ensure_content_script().await;
        assert_eq!(reply, EnsureReply::failed("No active tab"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ensures_inject_once() {
        let (host, _store, coordinator) = coordinator(FakeHost::new(&[(1, "https://a.test/", Probe::Refuse)]));

        let (first, second) = tokio::join!(
            coordinator.ensure_content_script(),
            coordinator.ensure_content_script()
        );

        assert!(first.content_script_ready && second.content_script_ready);
        assert_eq!(host.injected_tabs(), vec![TabId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_installed_resets_flag_and_injects_web_pages() {
        let (host, store, coordinator) = coordinator(FakeHost::new(&[
            (1, "https://a.test/", Probe::Refuse),
            (2, "chrome://newtab", Probe::Refuse),
            (3, "https://b.test/", Probe::Answer),
            (4, "http://c.test/", Probe::Refuse),
        ]));
        store.set_enabled(true).unwrap();

        coordinator.on_installed().await.unwrap();

        assert!(!store.settings().enabled);
        assert_eq!(host.injected_tabs(), vec![TabId(1), TabId(4)]);
    }
}
