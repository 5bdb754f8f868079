//! Durable key-value storage area with change notifications
//!
//! Writes are last-write-wins. Every write that actually changes a value is
//! broadcast to all subscribers of the change bus, tagged with the storage
//! area it happened in. A file-backed store rewrites its JSON file atomically
//! on each write, so a crash never leaves a half-written settings file.

use crate::error::{ExtensionError, ExtensionResult};
use crate::settings::schema::{Rgb, Settings, COLOR_KEY, ENABLED_KEY, SETTINGS_KEYS, TRAIL_LENGTH_KEY};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Notifications buffered per subscriber before it starts lagging
const CHANGE_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Durable, device-local storage
    Local,
    /// Storage synced across the user's browsers
    Sync,
}

impl std::fmt::Display for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageArea::Local => write!(f, "local"),
            StorageArea::Sync => write!(f, "sync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// One write's worth of changed keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: BTreeMap<String, ValueChange>,
}

impl StorageChange {
    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.get(key)
    }

    pub fn touches(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }
}

/// Create the bus that storage areas publish their changes on
pub fn change_bus() -> broadcast::Sender<StorageChange> {
    broadcast::channel(CHANGE_BUFFER).0
}

pub struct SettingsStore {
    area: StorageArea,
    values: Mutex<Map<String, Value>>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<StorageChange>,
}

impl SettingsStore {
    pub fn in_memory(area: StorageArea, changes: broadcast::Sender<StorageChange>) -> Self {
        Self {
            area,
            values: Mutex::new(Map::new()),
            path: None,
            changes,
        }
    }

    /// Open a store backed by a JSON file, creating it lazily on first write
    pub fn open(
        area: StorageArea,
        path: impl Into<PathBuf>,
        changes: broadcast::Sender<StorageChange>,
    ) -> ExtensionResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                other => {
                    return Err(ExtensionError::ConfigurationError(format!(
                        "settings file {} holds {} instead of an object",
                        path.display(),
                        json_kind(&other)
                    )))
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!(
            "Opened {} storage at {} ({} keys)",
            area,
            path.display(),
            values.len()
        );

        Ok(Self {
            area,
            values: Mutex::new(values),
            path: Some(path),
            changes,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    /// Read the given keys; absent keys are left out of the result
    pub fn get(&self, keys: &[&str]) -> Map<String, Value> {
        let values = self.values.lock();
        keys.iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Write the given items and notify subscribers of what changed
    pub fn set(&self, items: Map<String, Value>) -> ExtensionResult<()> {
        let mut values = self.values.lock();
        let mut next = values.clone();
        let mut changes = BTreeMap::new();

        for (key, new_value) in items {
            let old_value = next.get(&key).cloned();
            if old_value.as_ref() == Some(&new_value) {
                continue;
            }
            changes.insert(
                key.clone(),
                ValueChange {
                    old_value,
                    new_value: Some(new_value.clone()),
                },
            );
            next.insert(key, new_value);
        }

        if changes.is_empty() {
            return Ok(());
        }

        if let Some(path) = &self.path {
            write_atomically(path, &next)?;
        }
        *values = next;

        tracing::debug!(
            "{} storage changed: {:?}",
            self.area,
            changes.keys().collect::<Vec<_>>()
        );

        // Published under the lock so subscribers see writes in order.
        // Nobody listening is fine.
        let _ = self.changes.send(StorageChange {
            area: self.area,
            changes,
        });
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings::from_values(&self.get(&SETTINGS_KEYS))
    }

    pub fn set_enabled(&self, enabled: bool) -> ExtensionResult<()> {
        let mut items = Map::new();
        items.insert(ENABLED_KEY.to_string(), Value::Bool(enabled));
        self.set(items)
    }

    pub fn set_appearance(&self, color: Rgb, trail_length: u32) -> ExtensionResult<()> {
        let mut items = Map::new();
        items.insert(COLOR_KEY.to_string(), Value::String(color.to_hex()));
        items.insert(TRAIL_LENGTH_KEY.to_string(), Value::from(trail_length));
        self.set(items)
    }
}

fn write_atomically(path: &Path, values: &Map<String, Value>) -> ExtensionResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, values)?;
    file.write_all(b"\n")?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
