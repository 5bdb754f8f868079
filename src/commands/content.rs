//! Messages handled inside a page by the content script

use crate::content::ContentScript;
use crate::messaging::{ContentMessage, ContentReply};
use crate::renderer::TrailConfig;
use crate::settings::Rgb;

/// Answer a popup or background message
///
/// `UPDATE_SETTINGS` is acknowledged with `success: false` when its colour or
/// trail length is unusable; the running trail is left untouched in that case.
pub fn handle_content_message(script: &ContentScript, message: ContentMessage) -> ContentReply {
    match message {
        ContentMessage::Ping => ContentReply::Pong { ready: true },
        ContentMessage::ToggleLaser { enabled } => {
            if enabled {
                script.enable();
            } else {
                script.disable();
            }
            ContentReply::ack(true)
        }
        ContentMessage::UpdateSettings {
            color,
            trail_length,
        } => {
            let config = Rgb::parse_hex(&color).and_then(|rgb| TrailConfig::new(rgb, trail_length));
            match config {
                Ok(config) => {
                    script.reconfigure(config);
                    ContentReply::ack(true)
                }
                Err(e) => {
                    tracing::warn!("Rejected UPDATE_SETTINGS: {}", e);
                    ContentReply::ack(false)
                }
            }
        }
    }
}
