//! Messages handled by the background service

use crate::background::coordinator::{LifecycleCoordinator, PageHost};
use crate::messaging::{BackgroundMessage, EnsureReply};

pub async fn handle_background_message<H: PageHost>(
    coordinator: &LifecycleCoordinator<H>,
    message: BackgroundMessage,
) -> EnsureReply {
    match message {
        BackgroundMessage::EnsureContentScript => {
            let reply = coordinator.ensure_content_script().await;
            tracing::debug!(
                "ENSURE_CONTENT_SCRIPT -> ready={} injected={:?}",
                reply.content_script_ready,
                reply.injected
            );
            reply
        }
    }
}
