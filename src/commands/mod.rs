//! Message handlers
//!
//! This module contains the handlers for every message type the extension
//! contexts exchange over the runtime messaging API.

pub mod background;
pub mod content;
