//! Validity of the extension runtime as seen from a page
//!
//! When the extension is disabled, reloaded or removed, content scripts that
//! were already injected keep running but lose their connection to the
//! extension. Nothing tells them so; they have to poll.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct ExtensionContext {
    valid: AtomicBool,
}

impl Default for ExtensionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionContext {
    pub fn new() -> Self {
        Self {
            valid: AtomicBool::new(true),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Mark the extension as gone (disabled, reloaded or uninstalled)
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::SeqCst) {
            tracing::warn!("Extension context invalidated");
        }
    }
}
