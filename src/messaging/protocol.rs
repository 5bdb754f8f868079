//! Messages exchanged between the popup, the background and content scripts
//!
//! The JSON shape matches what the extension pages send over the runtime
//! messaging API: a `type` tag plus camelCase fields.

use serde::{Deserialize, Serialize};

/// Requests handled by a content script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentMessage {
    /// Liveness probe
    Ping,
    ToggleLaser {
        enabled: bool,
    },
    UpdateSettings {
        color: String,
        #[serde(rename = "trailLength")]
        trail_length: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentReply {
    Pong { ready: bool },
    Ack { success: bool },
}

impl ContentReply {
    pub fn ack(success: bool) -> Self {
        ContentReply::Ack { success }
    }
}

/// Requests handled by the background service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundMessage {
    EnsureContentScript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureReply {
    pub content_script_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnsureReply {
    /// The content script answered the probe
    pub fn ready() -> Self {
        Self {
            content_script_ready: true,
            injected: None,
            error: None,
        }
    }

    /// The content script had to be injected first
    pub fn injected() -> Self {
        Self {
            content_script_ready: true,
            injected: Some(true),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content_script_ready: false,
            injected: None,
            error: Some(error.into()),
        }
    }
}
