//! Cross-context messaging

pub mod channel;
pub mod protocol;

pub use channel::{mailbox, request, Envelope, Inbox, Mailbox, Responder};
pub use protocol::{BackgroundMessage, ContentMessage, ContentReply, EnsureReply};
