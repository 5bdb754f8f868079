//! Request/reply transport between extension contexts
//!
//! A request travels as an [`Envelope`] holding the message and a
//! [`Responder`]. A handler that answers later simply moves the responder into
//! whatever task produces the answer; if the responder is dropped unanswered,
//! the requester gets a delivery error instead of hanging.

use crate::error::{ExtensionError, ExtensionResult};
use tokio::sync::{mpsc, oneshot};

pub struct Envelope<M, R> {
    pub message: M,
    pub reply: Responder<R>,
}

pub struct Responder<R>(oneshot::Sender<R>);

impl<R> Responder<R> {
    pub fn respond(self, reply: R) {
        if self.0.send(reply).is_err() {
            tracing::debug!("Requester went away before the reply was sent");
        }
    }
}

pub type Mailbox<M, R> = mpsc::Sender<Envelope<M, R>>;
pub type Inbox<M, R> = mpsc::Receiver<Envelope<M, R>>;

pub fn mailbox<M, R>(capacity: usize) -> (Mailbox<M, R>, Inbox<M, R>) {
    mpsc::channel(capacity)
}

/// Send `message` and wait for the reply
pub async fn request<M, R>(mailbox: &Mailbox<M, R>, message: M) -> ExtensionResult<R> {
    let (tx, rx) = oneshot::channel();
    mailbox
        .send(Envelope {
            message,
            reply: Responder(tx),
        })
        .await
        .map_err(|_| {
            ExtensionError::DeliveryFailed(
                "Could not establish connection. Receiving end does not exist.".to_string(),
            )
        })?;

    rx.await.map_err(|_| {
        ExtensionError::DeliveryFailed(
            "The message port closed before a response was received.".to_string(),
        )
    })
}
