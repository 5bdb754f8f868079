//! Background service of the extension
//!
//! The background owns the lifecycle coordinator and answers requests from
//! the popup. Each request is handled on its own task, with the reply handle
//! moved into that task, so a slow probe or injection neither blocks other
//! requests nor loses its answer.

pub mod coordinator;

pub use coordinator::{InjectionPayload, LifecycleCoordinator, PageHost, TabId, TabInfo};

use crate::commands::background::handle_background_message;
use crate::error::ExtensionResult;
use crate::messaging::{mailbox, request, BackgroundMessage, EnsureReply, Envelope, Mailbox};
use std::sync::Arc;
use tokio::task::JoinHandle;

const MAILBOX_CAPACITY: usize = 16;

pub struct BackgroundHandle {
    mailbox: Mailbox<BackgroundMessage, EnsureReply>,
    task: JoinHandle<()>,
}

impl BackgroundHandle {
    pub async fn send(&self, message: BackgroundMessage) -> ExtensionResult<EnsureReply> {
        request(&self.mailbox, message).await
    }
}

impl Drop for BackgroundHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start serving background requests
///
/// Must be called from within a Tokio runtime.
pub fn spawn_background<H>(coordinator: Arc<LifecycleCoordinator<H>>) -> BackgroundHandle
where
    H: PageHost + 'static,
{
    let (tx, mut inbox) = mailbox(MAILBOX_CAPACITY);

    let task = tokio::spawn(async move {
        while let Some(Envelope { message, reply }) = inbox.recv().await {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                reply.respond(handle_background_message(&coordinator, message).await);
            });
        }
        tracing::debug!("Background mailbox closed");
    });

    tracing::info!("Background service started");
    BackgroundHandle { mailbox: tx, task }
}
